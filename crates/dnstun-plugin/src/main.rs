//! dnstun
//!
//! Offline front end for the tunneling detector: loads the configured
//! model, builds the same pipeline a DNS server would (detector followed by
//! a forwarder) and prints one verdict per query name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use dnstun_core::{Handler, Outcome, PipelineBuilder, QueryContext, ResponseWriter};
use dnstun_plugin::{register, telemetry, DnstunConfig};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::io::BufRead;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "dnstun")]
#[command(about = "Classify DNS query names as tunneling or benign", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "dnstun.yaml", env = "DNSTUN_CONFIG")]
    config: String,

    /// Query type of the synthesized requests
    #[arg(short = 't', long, default_value = "A")]
    qtype: String,

    /// Print verdicts as JSON lines
    #[arg(long)]
    json: bool,

    /// Print a Prometheus metrics snapshot after classification
    #[arg(long)]
    metrics: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Names to classify; read from stdin, one per line, when omitted
    names: Vec<String>,
}

/// One line of output
#[derive(Debug, Serialize)]
struct Verdict {
    name: String,
    outcome: &'static str,
    rcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Stand-in for the rest of the server: accepts everything it is handed
struct Forwarder;

#[async_trait]
impl Handler for Forwarder {
    async fn serve_dns(
        &self,
        _ctx: &QueryContext,
        _writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Outcome {
        debug!(id = request.id(), "Forwarded");
        Outcome::Success
    }

    fn name(&self) -> &str {
        "forward"
    }
}

/// Collects responses instead of sending them
#[derive(Default)]
struct CollectingWriter {
    responses: Vec<Message>,
}

#[async_trait]
impl ResponseWriter for CollectingWriter {
    async fn write_msg(&mut self, msg: &Message) -> dnstun_core::Result<()> {
        self.responses.push(msg.clone());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let metrics_handle = if cli.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let config = DnstunConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    let qtype = RecordType::from_str(&cli.qtype)
        .map_err(|e| anyhow::anyhow!("Invalid query type {}: {}", cli.qtype, e))?;

    let pipeline = register(PipelineBuilder::new(), &config)
        .context("Failed to set up detector")?
        .terminal(std::sync::Arc::new(Forwarder))
        .build();
    info!(handlers = ?pipeline.handler_names(), "Pipeline ready");

    let names = if cli.names.is_empty() {
        read_names(std::io::stdin().lock())?
    } else {
        cli.names.clone()
    };

    for (idx, name) in names.iter().enumerate() {
        let verdict = classify(&pipeline, query_id(idx), name, qtype).await;
        if cli.json {
            println!("{}", serde_json::to_string(&verdict)?);
        } else {
            match &verdict.error {
                Some(error) => println!(
                    "{}\t{}\t{}\t{}",
                    verdict.name, verdict.outcome, verdict.rcode, error
                ),
                None => println!("{}\t{}\t{}", verdict.name, verdict.outcome, verdict.rcode),
            }
        }
    }

    if let Some(handle) = metrics_handle {
        print!("{}", handle.render());
    }

    Ok(())
}

async fn classify(
    pipeline: &dnstun_core::Pipeline,
    id: u16,
    name: &str,
    qtype: RecordType,
) -> Verdict {
    let request = match Name::from_str(name) {
        Ok(qname) => query(id, qname, qtype),
        Err(e) => {
            return Verdict {
                name: name.to_string(),
                outcome: "invalid",
                rcode: "-".to_string(),
                error: Some(e.to_string()),
            }
        }
    };

    let mut writer = CollectingWriter::default();
    let outcome = pipeline
        .serve_dns(&QueryContext::new(), &mut writer, &request)
        .await;
    debug!(name, written = writer.responses.len(), "Query done");

    Verdict {
        name: name.to_string(),
        outcome: outcome.label(),
        rcode: format!("{:?}", outcome.response_code()),
        error: outcome.error().map(ToString::to_string),
    }
}

/// Message id for the `idx`-th name; saturates past the 16-bit range
fn query_id(idx: usize) -> u16 {
    u16::try_from(idx).unwrap_or(u16::MAX)
}

fn query(id: u16, name: Name, qtype: RecordType) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(name, qtype));
    msg
}

fn read_names(input: impl BufRead) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for line in input.lines() {
        let line = line.context("Failed to read names from stdin")?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            names.push(line.to_string());
        }
    }
    Ok(names)
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new(
            "dnstun=debug,dnstun_core=debug,dnstun_classifiers=debug,dnstun_plugin=debug",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize metrics recorder and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    telemetry::describe();
    Ok(handle)
}

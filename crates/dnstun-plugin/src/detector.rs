//! DNS tunneling detection handler
//!
//! Per query: encode the name, classify it within the time budget, then
//! either refuse (writing a REFUSED response) or report success so the
//! chain moves on. Failures write nothing and surface as SERVFAIL.

use crate::config::DnstunConfig;
use crate::telemetry::{ERRORS_TOTAL, INFERENCE_LATENCY_US, QUERIES_TOTAL};
use async_trait::async_trait;
use dnstun_classifiers::{
    CharCnnClassifier, Decision, DecisionPolicy, NameEncoder, Prediction, SequenceClassifier,
};
use dnstun_core::response;
use dnstun_core::{Error, Handler, Outcome, QueryContext, Request, ResponseWriter, Result};
use hickory_proto::op::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name the handler registers under
pub const HANDLER_NAME: &str = "dnstun";

/// Detector handler holding the encoder, model and policy
pub struct Dnstun {
    encoder: NameEncoder,
    classifier: Arc<dyn SequenceClassifier>,
    policy: DecisionPolicy,
    timeout: Duration,
}

impl Dnstun {
    /// Create a detector; fails if the policy's class does not exist in the model
    pub fn new(
        classifier: Arc<dyn SequenceClassifier>,
        encoder: NameEncoder,
        policy: DecisionPolicy,
    ) -> Result<Self> {
        policy.validate(classifier.num_classes())?;

        Ok(Self {
            encoder,
            classifier,
            policy,
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
        })
    }

    /// Load the model named by the configuration and build a detector
    pub fn from_config(config: &DnstunConfig) -> Result<Self> {
        config.validate()?;

        let classifier =
            CharCnnClassifier::load(&config.model.to_model_config(), config.sequence_length)?;

        Ok(Self::new(
            Arc::new(classifier),
            NameEncoder::new(config.sequence_length),
            DecisionPolicy::new(config.blocked_class),
        )?
        .with_timeout(config.timeout()))
    }

    /// Set the per-query inference budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a name, bounded by cancellation and the time budget
    pub async fn predict(&self, ctx: &QueryContext, name: &str) -> Result<Prediction> {
        let sequence = self.encoder.encode(name);
        let budget = ctx.budget(self.timeout);

        // Fires on every exit, so queued inference for an abandoned query is skipped
        let cancel = ctx.cancellation().child_token();
        let _abandon = cancel.clone().drop_guard();

        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(budget, self.classifier.classify(&sequence, &cancel)) => {
                result.map_err(|_| Error::Timeout(budget))?
            }
        }
    }

    /// Decision for a prediction
    pub fn decide(&self, prediction: &Prediction) -> Decision {
        self.policy.decide(prediction.class_index)
    }

    /// Name of the underlying classifier
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Decision policy in use
    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    /// Per-query inference budget
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sequence length names are encoded to
    pub fn sequence_length(&self) -> usize {
        self.encoder.length()
    }

    fn fail(&self, qname: Option<&str>, error: Error) -> Outcome {
        metrics::counter!(ERRORS_TOTAL, "kind" => error.kind()).increment(1);
        warn!(qname = qname.unwrap_or("-"), error = %error, "Query classification failed");
        Outcome::Failure(error)
    }
}

#[async_trait]
impl Handler for Dnstun {
    async fn serve_dns(
        &self,
        ctx: &QueryContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Outcome {
        let qname = match Request::new(request).qname() {
            Ok(qname) => qname,
            Err(e) => return self.fail(None, e),
        };

        let prediction = match self.predict(ctx, &qname).await {
            Ok(prediction) => prediction,
            Err(e) => return self.fail(Some(&qname), e),
        };

        let decision = self.decide(&prediction);
        metrics::histogram!(INFERENCE_LATENCY_US).record(prediction.latency_us as f64);
        metrics::counter!(QUERIES_TOTAL, "decision" => decision.as_str()).increment(1);

        debug!(
            qname = %qname,
            class = prediction.class_index,
            score = prediction.score,
            decision = decision.as_str(),
            latency_us = prediction.latency_us,
            "Query classified"
        );

        match decision {
            Decision::Allow => Outcome::Success,
            Decision::Refuse => {
                let reply = response::refused(request);
                if let Err(e) = writer.write_msg(&reply).await {
                    let e = match e {
                        Error::ProtocolWrite(_) => e,
                        other => Error::protocol_write(other.to_string()),
                    };
                    return self.fail(Some(&qname), e);
                }

                info!(qname = %qname, id = reply.id(), "Refused suspected tunneling query");
                Outcome::Refused(reply)
            }
        }
    }

    fn name(&self) -> &str {
        HANDLER_NAME
    }
}

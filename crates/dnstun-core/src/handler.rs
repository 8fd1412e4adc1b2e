//! Request handlers and chain composition
//!
//! A pipeline is an ordered list of handlers configured once at startup.
//! Each node wraps one handler together with a reference to the next node:
//! - the node runs its handler first
//! - a `Success` outcome passes control to the next node
//! - a refusal or failure stops the chain and is returned verbatim

use crate::error::{Error, Result};
use crate::types::{Outcome, QueryContext};
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::{debug, trace};

/// Sink for responses produced by handlers
#[async_trait]
pub trait ResponseWriter: Send {
    /// Write a response back to the client
    async fn write_msg(&mut self, msg: &Message) -> Result<()>;
}

/// Trait for all request handlers
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one query
    async fn serve_dns(
        &self,
        ctx: &QueryContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Outcome;

    /// Get the handler name
    fn name(&self) -> &str;
}

/// Shared handler reference
pub type SharedHandler = Arc<dyn Handler>;

/// Factory that wraps a handler around the next node of a pipeline
pub type Plugin = Box<dyn FnOnce(Option<SharedHandler>) -> SharedHandler + Send>;

/// Composite handler: runs `handler`, then `next` only on success
#[derive(Clone)]
pub struct ChainHandler {
    handler: SharedHandler,
    next: Option<SharedHandler>,
}

impl ChainHandler {
    /// Compose a handler with its successor
    pub fn new(handler: SharedHandler, next: Option<SharedHandler>) -> Self {
        Self { handler, next }
    }
}

#[async_trait]
impl Handler for ChainHandler {
    async fn serve_dns(
        &self,
        ctx: &QueryContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Outcome {
        let outcome = self.handler.serve_dns(ctx, writer, request).await;
        if !outcome.is_success() {
            trace!(
                handler = self.handler.name(),
                outcome = outcome.label(),
                "Chain stopped"
            );
            return outcome;
        }

        match &self.next {
            Some(next) => next.serve_dns(ctx, writer, request).await,
            None => Outcome::Failure(Error::NoNextHandler(self.handler.name().to_string())),
        }
    }

    fn name(&self) -> &str {
        self.handler.name()
    }
}

/// Register a handler as a chain node: its successor runs only on success
pub fn chain(handler: SharedHandler) -> Plugin {
    Box::new(move |next: Option<SharedHandler>| {
        Arc::new(ChainHandler::new(handler, next)) as SharedHandler
    })
}

/// Register a handler that ends the pipeline and ignores any successor
pub fn terminal(handler: SharedHandler) -> Plugin {
    Box::new(move |_next: Option<SharedHandler>| handler)
}

/// Immutable, ordered handler pipeline
#[derive(Clone)]
pub struct Pipeline {
    head: Option<SharedHandler>,
    names: Vec<String>,
}

impl Pipeline {
    /// Run a query through the pipeline
    pub async fn serve_dns(
        &self,
        ctx: &QueryContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Outcome {
        match &self.head {
            Some(head) => head.serve_dns(ctx, writer, request).await,
            None => Outcome::Failure(Error::NoNextHandler("empty pipeline".to_string())),
        }
    }

    /// Names of the registered plugins, in execution order
    pub fn handler_names(&self) -> &[String] {
        &self.names
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no plugin was registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Builder collecting plugins in registration order
#[derive(Default)]
pub struct PipelineBuilder {
    plugins: Vec<(String, Plugin)>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; registration order is execution order
    pub fn add_plugin(mut self, name: impl Into<String>, plugin: Plugin) -> Self {
        self.plugins.push((name.into(), plugin));
        self
    }

    /// Append a handler as a chain node
    pub fn chain(self, handler: SharedHandler) -> Self {
        let name = handler.name().to_string();
        self.add_plugin(name, chain(handler))
    }

    /// Append a handler that ends the pipeline
    pub fn terminal(self, handler: SharedHandler) -> Self {
        let name = handler.name().to_string();
        self.add_plugin(name, terminal(handler))
    }

    /// Build the pipeline, linking each plugin to the one registered after it
    pub fn build(self) -> Pipeline {
        let mut names = Vec::with_capacity(self.plugins.len());
        let mut next: Option<SharedHandler> = None;

        for (name, plugin) in self.plugins.into_iter().rev() {
            next = Some(plugin(next));
            names.push(name);
        }
        names.reverse();

        debug!(handlers = ?names, "Pipeline built");

        Pipeline { head: next, names }
    }
}

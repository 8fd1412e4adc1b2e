//! dnstun Core
//!
//! Core types, traits, and utilities shared across dnstun components.
//!
//! This crate provides:
//! - Error types and result handling
//! - The per-query context and a read-only request view
//! - The `Handler` / `ResponseWriter` traits of the request pipeline
//! - Chain composition with early exit on refusal or failure
//! - Response builders for policy refusals

pub mod error;
pub mod handler;
pub mod response;
pub mod types;

pub use error::{Error, Result};
pub use handler::{
    chain, terminal, ChainHandler, Handler, Pipeline, PipelineBuilder, Plugin, ResponseWriter,
    SharedHandler,
};
pub use types::{Outcome, QueryContext, Request};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::handler::{Handler, PipelineBuilder, ResponseWriter};
    pub use crate::types::{Outcome, QueryContext, Request};
}

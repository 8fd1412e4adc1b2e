//! Error types for dnstun

use hickory_proto::op::ResponseCode;
use std::time::Duration;

/// Result type alias using dnstun's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dnstun operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model could not be loaded or does not match the expected layout.
    /// Fatal for the handler being set up, never for a single query.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Inference for a single query could not complete
    #[error("classification error: {0}")]
    Classification(String),

    /// Writing a response through the protocol layer failed
    #[error("protocol write error: {0}")]
    ProtocolWrite(String),

    /// The request carries nothing to classify
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A chain node asked to forward but has no successor
    #[error("no next handler after {0}")]
    NoNextHandler(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Inference exceeded its time budget
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    /// The query was cancelled by its execution context
    #[error("inference cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new initialization error
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a new classification error
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Create a new protocol write error
    pub fn protocol_write(msg: impl Into<String>) -> Self {
        Self::ProtocolWrite(msg.into())
    }

    /// Create a new malformed request error
    pub fn malformed_request(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// DNS response code reported to the caller when a query fails with this error
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::MalformedRequest(_) => ResponseCode::FormErr,
            _ => ResponseCode::ServFail,
        }
    }

    /// Short stable label, used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initialization(_) => "initialization",
            Self::Classification(_) => "classification",
            Self::ProtocolWrite(_) => "protocol_write",
            Self::MalformedRequest(_) => "malformed_request",
            Self::NoNextHandler(_) => "no_next_handler",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

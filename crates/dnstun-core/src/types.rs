//! Core types for dnstun

use crate::error::{Error, Result};
use hickory_proto::op::{Message, Query, ResponseCode};
use hickory_proto::rr::RecordType;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-query execution context.
///
/// Carries the cancellation signal and optional deadline of one request so
/// that long-running stages (model inference) can be bounded by the host.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// Create a context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing cancellation token
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    /// Set an absolute deadline for the query
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancellation token for this query
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Check whether the query has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The smaller of `limit` and the time left before the deadline
    pub fn budget(&self, limit: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.min(limit),
            None => limit,
        }
    }
}

/// Read-only view over an already parsed DNS request
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    message: &'a Message,
}

impl<'a> Request<'a> {
    /// Wrap a parsed request message
    pub fn new(message: &'a Message) -> Self {
        Self { message }
    }

    /// Transaction id of the request
    pub fn id(&self) -> u16 {
        self.message.id()
    }

    /// First question of the request
    pub fn question(&self) -> Result<&'a Query> {
        self.message
            .queries()
            .first()
            .ok_or_else(|| Error::malformed_request("request carries no question"))
    }

    /// Lower-cased, fully-qualified query name (always ends with a dot)
    pub fn qname(&self) -> Result<String> {
        let mut name = self.question()?.name().to_lowercase();
        name.set_fqdn(true);
        Ok(name.to_string())
    }

    /// Query type of the first question
    pub fn qtype(&self) -> Result<RecordType> {
        Ok(self.question()?.query_type())
    }
}

/// Result reported by a handler for one query.
///
/// Refusal is a policy outcome and travels on the normal channel;
/// only `Failure` carries an error.
#[derive(Debug)]
pub enum Outcome {
    /// Processing may continue with the next handler
    Success,

    /// The query was refused; the written response is attached
    Refused(Message),

    /// The query could not be processed
    Failure(Error),
}

impl Outcome {
    /// Whether downstream handlers should run
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the query was refused by policy
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::Refused(_))
    }

    /// DNS response code reported to the caller
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::Success => ResponseCode::NoError,
            Self::Refused(_) => ResponseCode::Refused,
            Self::Failure(err) => err.response_code(),
        }
    }

    /// The error carried by a failed outcome
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// The response attached to a refusal
    pub fn response(&self) -> Option<&Message> {
        match self {
            Self::Refused(msg) => Some(msg),
            _ => None,
        }
    }

    /// Short label, used for logging and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Refused(_) => "refused",
            Self::Failure(_) => "failure",
        }
    }
}

impl From<Result<()>> for Outcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(err) => Self::Failure(err),
        }
    }
}

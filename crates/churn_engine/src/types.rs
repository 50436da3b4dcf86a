use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use churn_core::{AttemptOutcome, ListKind, UserRef};

/// Source of capture timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// One page of a relationship list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    pub users: Vec<UserRef>,
    pub next_cursor: Option<String>,
}

/// A single page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub list: ListKind,
    pub handle: &'a str,
    pub cursor: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies the error for the retry policy.
    pub fn into_outcome(self) -> AttemptOutcome<FetchError> {
        match self.kind {
            FailureKind::RateLimited => AttemptOutcome::RateLimited(self),
            FailureKind::HttpStatus(status) => AttemptOutcome::ServerError {
                status,
                cause: self,
            },
            FailureKind::Network => AttemptOutcome::Network(self),
            FailureKind::Timeout => AttemptOutcome::Timeout(self),
            FailureKind::Decode
            | FailureKind::InvalidRequest
            | FailureKind::TooLarge { .. } => AttemptOutcome::Fatal(self),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    HttpStatus(u16),
    Network,
    Timeout,
    Decode,
    InvalidRequest,
    TooLarge { max_bytes: u64, actual: Option<u64> },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::InvalidRequest => write!(f, "invalid request"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
        }
    }
}

/// A capture failed because one of the two list fetches failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{list} fetch failed: {source}")]
pub struct OrchestratorError {
    pub list: ListKind,
    #[source]
    pub source: FetchError,
}

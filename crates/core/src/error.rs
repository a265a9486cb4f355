//! Error taxonomy shared across the voice interaction core
//!
//! Kinds drive behavior: transient errors are retried, validation and
//! cancellation are surfaced immediately and never touch health accounting,
//! service errors feed the degradation controller.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the core crates
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed input: empty audio, unsupported language. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Timeout, connection failure, upstream 5xx-equivalent. Retryable.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Operation exceeded its deadline. Counts as transient.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A model adapter or downstream dependency failed permanently.
    #[error("service failure: {0}")]
    Service(String),

    /// The caller aborted the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the retry engine should attempt this operation again
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Timeout(_))
    }

    /// Whether this error came from caller-side cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this error must bypass retry and health accounting
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

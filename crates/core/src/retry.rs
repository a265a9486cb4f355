//! Exponential backoff retry engine
//!
//! Delays double per attempt: 1s, 2s, 4s for the default base delay. A
//! cancellation during the inter-attempt sleep aborts immediately without
//! issuing further attempts.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt after
    pub base_delay: Duration,
    /// Optional cap on the exponential growth
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay to sleep after the given failed attempt (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Retry an operation on any failure, up to the configured attempts.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_if(config, cancel, op, |_| true).await
}

/// Retry an operation, but only when the error matches `retry_on`.
///
/// Non-matching errors and cancellations are returned immediately. The last
/// error is returned once attempts are exhausted.
pub async fn retry_if<T, F, Fut, P>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut op: F,
    retry_on: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        attempt,
                        max_attempts = config.max_attempts,
                        "operation succeeded after retry"
                    );
                }
                return Ok(value);
            },
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        error = %e,
                        "operation failed after {} attempts",
                        attempt
                    );
                    return Err(e);
                }
                if !retry_on(&e) {
                    tracing::info!(error = %e, "error not retryable, giving up");
                    return Err(e);
                }

                let delay = config.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "operation failed, retrying"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {},
                }
                attempt += 1;
            },
        }
    }
}

// HLS Retry Utility: Shared retry-with-backoff logic for segment fetching.
//
// Waits `base_delay * 2^attempt` between attempts; the wait is cut short by cancellation.

use crate::DownloadError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    /// Delay after the first failure, doubled after every further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff after the failed attempt `attempt` (0-indexed). Saturates
    /// instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    Success(T),
    /// Failed attempt worth repeating (network, bad status, empty body, timeout)
    Retry(DownloadError),
    /// Failure that another attempt cannot fix (cancellation, invalid input)
    Fail(DownloadError),
}

impl<T> From<Result<T, DownloadError>> for RetryAction<T> {
    fn from(result: Result<T, DownloadError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if err.is_retryable() => Self::Retry(err),
            Err(err) => Self::Fail(err),
        }
    }
}

/// Execute an async operation with retry-and-backoff.
///
/// The `operation` closure receives the current attempt number (0-indexed).
/// Once `max_retries` retries have failed, the last error is wrapped in
/// [`DownloadError::RetryExhausted`].
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T, DownloadError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let mut attempt = 0;
    loop {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let err = match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => err,
        };

        if attempt >= policy.max_retries {
            return Err(DownloadError::RetryExhausted {
                retries: policy.max_retries,
                last_error: err.to_string(),
            });
        }

        let delay = policy.delay_for_attempt(attempt);
        warn!(
            attempt = attempt + 1,
            max = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient error"
        );
        tokio::select! {
            _ = token.cancelled() => {
                return Err(DownloadError::Cancelled);
            }
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

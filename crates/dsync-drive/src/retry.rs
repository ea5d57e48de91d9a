//! Retry with exponential backoff for Drive requests.
//!
//! Throttling (HTTP 429), server errors (5xx) and connection failures are
//! retried up to [`RetryPolicy::max_retries`] times. The delay doubles on
//! every attempt unless the server sent a `Retry-After` header, which takes
//! precedence.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::DriveError;

/// Default retry-after duration when the header is missing or unparseable
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Upper bound for a server-requested delay
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// How often and how patiently to retry transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `f` until it succeeds, fails permanently or retries run out.
    pub async fn run<F, Fut, T>(&self, operation: &str, f: F) -> Result<T, DriveError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        self.run_when(operation, DriveError::is_transient, f).await
    }

    /// Like [`run`](Self::run), retrying only the errors `retry_if` accepts.
    pub async fn run_when<F, Fut, T>(
        &self,
        operation: &str,
        retry_if: fn(&DriveError) -> bool,
        f: F,
    ) -> Result<T, DriveError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.max_retries && retry_if(&err) => {
                    let delay = err.retry_after().unwrap_or_else(|| self.backoff(attempt));
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Parses a `Retry-After` header value as seconds or an HTTP date.
///
/// Dates in the past or more than an hour away fall back to `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(wait) = wait.to_std() {
            if wait <= MAX_RETRY_AFTER {
                return wait;
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}

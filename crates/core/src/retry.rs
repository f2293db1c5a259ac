//! Retry with exponential backoff for provider calls.
//!
//! Only transient failures (HTTP 429, 500, 503) are retried. Anything else is
//! returned to the caller after the first attempt.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::metrics::PROVIDER_RETRIES;

/// HTTP status codes treated as transient.
pub const RETRYABLE_STATUS_CODES: [u16; 3] = [429, 500, 503];

/// Errors that may carry a provider HTTP status.
pub trait Retryable {
    /// HTTP status reported by the provider, if any.
    fn status_code(&self) -> Option<u16>;

    fn is_retryable(&self) -> bool {
        self.status_code()
            .is_some_and(|code| RETRYABLE_STATUS_CODES.contains(&code))
    }
}

/// Retry ceiling and initial backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each retryable failure.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    4000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay_ms: initial_delay.as_millis() as u64,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Backoff before retry number `retry` (1-indexed).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(multiplier))
    }
}

/// Progress notice passed to the retry callback before each retry.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    /// Index of the retry about to happen (1 = first retry).
    pub attempt: u32,
    /// How long we wait before it.
    pub delay: Duration,
    /// Human-readable status line.
    pub message: String,
}

/// Run `operation` under `policy`, reporting each retry through `on_retry`.
pub async fn with_retry<T, E, F, Fut, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
    N: FnMut(&RetryNotice),
{
    let max_attempts = policy.max_retries.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                let notice = RetryNotice {
                    attempt,
                    delay,
                    message: format!(
                        "Provider busy ({}), retrying in {}s (attempt {}/{})",
                        e,
                        delay.as_secs(),
                        attempt + 1,
                        max_attempts
                    ),
                };
                warn!("{}", notice.message);
                PROVIDER_RETRIES.inc();
                on_retry(&notice);

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// [`with_retry`] without a progress callback.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    with_retry(policy, operation, |_| {}).await
}

//! Caller-side retry with exponential backoff
//!
//! Tracker adapters make exactly one attempt per call. A caller that wants
//! resilience wraps a whole engine run in [`with_retry`]; only errors that
//! classify themselves as transient are retried.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How a failed attempt should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Retry, but not before the given delay (e.g. after HTTP 429)
    RetryAfter(Duration),
    NoRetry,
}

/// Errors that know whether they are transient
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Retry settings, as stored in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Backoff before retry number `attempt` (0-based): doubles each time, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let millis = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(millis).min(self.max_backoff())
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let delay = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(operation = operation_name, error = %err, "Not retrying permanent error");
                return Err(err);
            }
            _ if attempt >= config.max_retries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Giving up"
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(d) => d.min(config.max_backoff()),
            RetryDecision::Retry => config.backoff(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient error"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

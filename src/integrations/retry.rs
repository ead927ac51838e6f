//! Bounded retry for idempotent remote reads
//!
//! Searches and fetches against JIRA and Zendesk are retried a few times with
//! exponential backoff. Writes are never wrapped: a failed write surfaces to
//! the per-issue boundary and is re-attempted by the next pass, after the
//! engine has re-checked whether it was already applied.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry behaviour for one class of remote call
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Upper bound for both computed backoff and server-provided Retry-After
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Zendesk search is strictly rate limited, so wait longer between tries
    pub fn for_search() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff before retry number `attempt` (zero-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()))
    }
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Retry after a server-specified delay (Retry-After)
    RetryAfter(Duration),
    NoRetry,
}

/// Errors that know whether repeating the call could help
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Run `operation`, retrying transient failures according to `config`
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

        let backoff = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(operation = operation_name, error = %err, "Not retrying permanent error");
                return Err(err);
            }
            _ if attempt >= config.max_retries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Giving up after repeated failures"
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(d) => d.min(config.max_backoff),
            RetryDecision::Retry => config.backoff_duration(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            backoff_secs = backoff.as_secs_f64(),
            error = %err,
            "Retrying remote call"
        );
        sleep(backoff).await;
        attempt += 1;
    }
}

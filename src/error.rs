//! Error types for Deskbridge
//!
//! One enum covers every failure mode of a reconciliation pass. Variants are
//! grouped by how the pass reacts to them: configuration problems stop the
//! process, consistency and rule failures are reported per issue, and remote
//! failures are retried on the next pass.

use crate::integrations::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Deskbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Comprehensive error type for Deskbridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration errors (unknown field, group, form, transition, tag)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracker and desk disagree in a way that needs a human
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// A status action handler failed
    #[error("Action failed: {0}")]
    Action(String),

    /// Escalation hook errors
    #[error("Escalation error: {0}")]
    Escalation(String),

    /// Template parse or render errors
    #[error("Template error: {0}")]
    Template(String),

    /// Remote integration errors (JIRA, Zendesk)
    #[error("Integration error: {0}")]
    Integration(String),

    /// Rate limited (with retry-after duration in seconds)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Zendesk client errors
    #[error("Zendesk error: {0}")]
    Zendesk(#[from] zendesk::Error),

    /// Idempotency store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid escalation group pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl RetryableError for BridgeError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            BridgeError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
                        500..=599 => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else {
                    RetryDecision::Retry
                }
            }
            BridgeError::RateLimited(secs) => RetryDecision::RetryAfter(Duration::from_secs(*secs)),
            BridgeError::Zendesk(zendesk::Error::RateLimited(secs)) => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs))
            }
            BridgeError::Zendesk(e) if e.is_transient() => RetryDecision::Retry,
            BridgeError::Integration(msg) => {
                if msg.contains("timeout") || msg.contains("HTTP 5") {
                    RetryDecision::Retry
                } else {
                    RetryDecision::NoRetry
                }
            }
            _ => RetryDecision::NoRetry,
        }
    }
}

impl BridgeError {
    /// Whether the failure is expected to clear up on a later pass
    pub fn is_transient(&self) -> bool {
        !matches!(self.retry_decision(), RetryDecision::NoRetry)
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::Consistency(_) => "consistency",
            BridgeError::Action(_) => "action",
            BridgeError::Escalation(_) => "escalation",
            BridgeError::Template(_) => "template",
            BridgeError::Database(_) => "store",
            _ if self.is_transient() => "transient",
            _ => "remote",
        }
    }
}

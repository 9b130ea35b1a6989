//! Error types for jira-automation
//!
//! `TrackerError` (in [`crate::tracker`]) is the taxonomy for remote calls.
//! `AutomationError` wraps it together with the configuration and I/O failures
//! that only the outer layers (config loading, CLI) can hit.

use crate::retry::{RetryDecision, RetryableError};
use crate::tracker::TrackerError;
use thiserror::Error;

/// Result type alias for jira-automation operations
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Crate-level error
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Configuration errors (missing credentials, invalid file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Remote tracker errors
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl RetryableError for AutomationError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            AutomationError::Tracker(e) => e.retry_decision(),
            AutomationError::Config(_)
            | AutomationError::Io(_)
            | AutomationError::Json(_)
            | AutomationError::Yaml(_)
            | AutomationError::Other(_) => RetryDecision::NoRetry,
        }
    }
}

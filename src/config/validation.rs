//! Configuration validation
//!
//! Checks a resolved configuration before any tracker call is made:
//! - Site URL is present and uses http(s)
//! - Account email is present
//! - Timeouts and concurrency are non-zero

use super::automation_config::AutomationConfig;
use crate::AutomationError;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a jira-automation configuration
pub fn validate_config(config: &AutomationConfig) -> ValidationResult {
    let mut errors = Vec::new();

    match config.url.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::new(
            "url",
            "Jira URL is required (set `url` or JIRA_URL)",
        )),
        Some(url) if !is_valid_site_url(url) => errors.push(ValidationError::new(
            "url",
            format!("Invalid Jira URL: {} (expected http:// or https://)", url),
        )),
        Some(_) => {}
    }

    if config.email.as_deref().map(str::trim).unwrap_or("").is_empty() {
        errors.push(ValidationError::new(
            "email",
            "Account email is required (set `email` or JIRA_EMAIL)",
        ));
    }

    if config.token_env.trim_start_matches('$').trim().is_empty() {
        errors.push(ValidationError::new(
            "token_env",
            "Token environment variable name cannot be empty",
        ));
    }

    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "request_timeout_secs",
            "Request timeout must be at least 1 second",
        ));
    }

    if config.batch_concurrency == 0 {
        errors.push(ValidationError::new(
            "batch_concurrency",
            "Batch concurrency must be at least 1",
        ));
    }

    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        errors.push(ValidationError::new(
            "retry.initial_backoff_ms",
            "Initial backoff cannot exceed max_backoff_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_site_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &AutomationConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        AutomationError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

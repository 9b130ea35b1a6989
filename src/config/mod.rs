//! Configuration system
//!
//! Loads ~/.config/jira-automation/config.yaml with support for:
//! - Site URL and account email (overridable via JIRA_URL / JIRA_EMAIL)
//! - API token read from an environment variable, never from the file
//! - Request timeout, retry policy and batch concurrency

mod automation_config;
pub mod validation;

pub use automation_config::{
    AutomationConfig, TrackerCredentials, DEFAULT_TOKEN_ENV, EMAIL_ENV, URL_ENV,
};
pub use validation::{validate_config, validate_config_result, ValidationError};

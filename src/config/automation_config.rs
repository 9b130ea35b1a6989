//! Configuration file handling
//!
//! Loads `~/.config/jira-automation/config.yaml`. Site URL and account email
//! may come from the file or from `JIRA_URL` / `JIRA_EMAIL`; the API token only
//! ever comes from the environment (by default `JIRA_API_TOKEN`), optionally
//! seeded from a `.env` file in the working directory.

use crate::engine::DEFAULT_BATCH_CONCURRENCY;
use crate::retry::RetryConfig;
use crate::tracker::jira::DEFAULT_TIMEOUT;
use crate::{AutomationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const URL_ENV: &str = "JIRA_URL";
pub const EMAIL_ENV: &str = "JIRA_EMAIL";
pub const DEFAULT_TOKEN_ENV: &str = "JIRA_API_TOKEN";

/// Everything needed to authenticate against the tracker
#[derive(Clone, PartialEq, Eq)]
pub struct TrackerCredentials {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

impl std::fmt::Debug for TrackerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerCredentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// jira-automation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Jira site URL (e.g. https://example.atlassian.net)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Account email used for basic auth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Name of the environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Project key used in prompts and examples
    #[serde(default = "default_project")]
    pub project: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retry policy for whole runs
    #[serde(default)]
    pub retry: RetryConfig,

    /// Issues processed at once by `batch`
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_project() -> String {
    "KAN".to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            url: None,
            email: None,
            token_env: default_token_env(),
            project: default_project(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl AutomationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AutomationError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            url = ?config.url,
            project = %config.project,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Full resolution used by the CLI: `.env`, then the file (explicit path,
    /// or the default path when it exists), then environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "Loaded .env file");
        }

        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override URL and email from the environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(URL_ENV) {
            self.url = Some(url);
        }
        if let Some(email) = non_empty(EMAIL_ENV) {
            self.email = Some(email);
        }
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/jira-automation/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("jira-automation");
        path.push("config.yaml");
        path
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve credentials, reading the token with `lookup`
    pub fn credentials_with<F>(&self, lookup: F) -> Result<TrackerCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = self
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                AutomationError::Config(format!("Jira URL is not set (config `url` or {})", URL_ENV))
            })?;
        let email = self
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                AutomationError::Config(format!(
                    "Account email is not set (config `email` or {})",
                    EMAIL_ENV
                ))
            })?;
        let token_var = self.token_env.trim_start_matches('$');
        let api_token = lookup(token_var)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AutomationError::Config(format!("{} is not set", token_var)))?;

        Ok(TrackerCredentials {
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_token,
        })
    }

    /// Resolve credentials from the process environment
    pub fn credentials(&self) -> Result<TrackerCredentials> {
        self.credentials_with(|name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AutomationConfig::new();
        assert_eq!(config.token_env, "JIRA_API_TOKEN");
        assert_eq!(config.project, "KAN");
        assert_eq!(config.request_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.batch_concurrency, DEFAULT_BATCH_CONCURRENCY);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AutomationConfig {
            url: Some("https://old.atlassian.net".to_string()),
            ..Default::default()
        };
        config.apply_env(env(&[
            ("JIRA_URL", "https://new.atlassian.net"),
            ("JIRA_EMAIL", "bot@example.com"),
        ]));
        assert_eq!(config.url.as_deref(), Some("https://new.atlassian.net"));
        assert_eq!(config.email.as_deref(), Some("bot@example.com"));
    }

    #[test]
    fn test_blank_env_does_not_override() {
        let mut config = AutomationConfig {
            email: Some("me@example.com".to_string()),
            ..Default::default()
        };
        config.apply_env(env(&[("JIRA_EMAIL", "  ")]));
        assert_eq!(config.email.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_credentials_resolution() {
        let config = AutomationConfig {
            url: Some("https://example.atlassian.net/".to_string()),
            email: Some("bot@example.com".to_string()),
            ..Default::default()
        };

        let creds = config
            .credentials_with(env(&[("JIRA_API_TOKEN", "tok")]))
            .unwrap();
        assert_eq!(creds.base_url, "https://example.atlassian.net");
        assert_eq!(creds.api_token, "tok");
        assert!(!format!("{:?}", creds).contains("tok\""));

        let err = config.credentials_with(env(&[])).unwrap_err();
        assert!(err.to_string().contains("JIRA_API_TOKEN"));
    }

    #[test]
    fn test_custom_token_env() {
        let config = AutomationConfig {
            url: Some("https://example.atlassian.net".to_string()),
            email: Some("bot@example.com".to_string()),
            token_env: "$MY_TOKEN".to_string(),
            ..Default::default()
        };
        let creds = config.credentials_with(env(&[("MY_TOKEN", "abc")])).unwrap();
        assert_eq!(creds.api_token, "abc");
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let config = AutomationConfig::new();
        let err = config
            .credentials_with(env(&[("JIRA_API_TOKEN", "tok")]))
            .unwrap_err();
        assert!(matches!(err, AutomationError::Config(_)));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AutomationConfig =
            serde_yaml::from_str("url: https://example.atlassian.net\nretry:\n  max_retries: 0\n")
                .unwrap();
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.request_timeout_secs, 15);
    }
}

//! Issue tracker adapters
//!
//! The engine talks to the remote tracker exclusively through [`TrackerClient`].
//! Every operation is a single remote attempt: there are no retries in here, and
//! callers decide what to do with a [`TrackerError`].
//!
//! # Backends
//!
//! - **jira**: Jira Cloud REST API v3 over reqwest
//! - **memory**: in-process tracker that records every call

pub mod adf;
pub mod jira;
pub mod memory;

pub use adf::{AdfEncoder, RichTextEncoder};
pub use jira::JiraClient;
pub use memory::{CallKind, InMemoryTracker, TrackerCall};

use crate::retry::{RetryDecision, RetryableError};
use crate::snapshot::IssueSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The issue key does not exist on the tracker
    #[error("Issue not found: {0}")]
    NotFound(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network failure, timeout, 5xx, or any other unexpected status
    #[error("Transport error{}: {detail}", http_suffix(.status))]
    Transport { status: Option<u16>, detail: String },

    /// HTTP 429, with the server's `Retry-After` when it sent one
    #[error("Rate limited{}: {detail}", retry_suffix(.retry_after))]
    RateLimited {
        retry_after: Option<Duration>,
        detail: String,
    },

    /// The tracker answered with a success status but an unreadable body
    #[error("Malformed tracker response: {0}")]
    Decode(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {} seconds", d.as_secs()))
        .unwrap_or_default()
}

/// Wait used for a 429 that carried no usable `Retry-After`
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

impl TrackerError {
    pub fn transport(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Transport {
            status,
            detail: detail.into(),
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>, detail: impl Into<String>) -> Self {
        Self::RateLimited {
            retry_after,
            detail: detail.into(),
        }
    }
}

impl RetryableError for TrackerError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            TrackerError::NotFound(_) | TrackerError::Auth(_) | TrackerError::Decode(_) => {
                RetryDecision::NoRetry
            }
            TrackerError::RateLimited { retry_after, .. } => {
                RetryDecision::RetryAfter(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT))
            }
            TrackerError::Transport { status, .. } => match status {
                None => RetryDecision::Retry,
                Some(500..=599) => RetryDecision::Retry,
                Some(_) => RetryDecision::NoRetry,
            },
        }
    }
}

/// Workflow transition identifier, compared only by equality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(String);

impl TransitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A workflow move available from the issue's current status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub name: String,
    pub target_status: String,
}

impl Transition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        target_status: impl Into<String>,
    ) -> Self {
        Self {
            id: TransitionId::new(id),
            name: name.into(),
            target_status: target_status.into(),
        }
    }
}

/// Identifier of a posted comment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(String);

impl CommentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// New value for one field in a [`FieldPatch`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A user reference, by account id
    Account(String),
    /// The complete label set
    Labels(BTreeSet<String>),
}

/// Partial update: field name → new value
///
/// Fields missing from the patch are left untouched by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatch {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldPatch {
    pub const ASSIGNEE: &'static str = "assignee";
    pub const LABELS: &'static str = "labels";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn assignee(account_id: impl Into<String>) -> Self {
        Self::new().set(Self::ASSIGNEE, FieldValue::Account(account_id.into()))
    }

    pub fn labels(labels: BTreeSet<String>) -> Self {
        Self::new().set(Self::LABELS, FieldValue::Labels(labels))
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Typed operations against a remote issue tracker
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Fetch a fresh snapshot of an issue
    async fn fetch_issue(&self, key: &str) -> Result<IssueSnapshot, TrackerError>;

    /// Partially update an issue's fields
    async fn update_fields(&self, key: &str, patch: &FieldPatch) -> Result<(), TrackerError>;

    /// Transitions available from the issue's current status, in tracker order.
    /// An empty list is not an error.
    async fn list_transitions(&self, key: &str) -> Result<Vec<Transition>, TrackerError>;

    async fn apply_transition(
        &self,
        key: &str,
        transition: &TransitionId,
    ) -> Result<(), TrackerError>;

    /// Post a plain-text comment; the backend encodes it to its rich-text format.
    /// `None` means the comment was created but the tracker did not say under which id.
    async fn add_comment(&self, key: &str, text: &str) -> Result<Option<CommentId>, TrackerError>;
}

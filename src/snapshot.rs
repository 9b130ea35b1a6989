//! Issue snapshot model
//!
//! An [`IssueSnapshot`] is the engine's read of one issue at one point in time.
//! Backends build it once per fetch; nothing in the engine mutates it, and the
//! effect of a mutation is only observable by fetching a fresh snapshot.
//!
//! Status, priority, and issue type names arrive as free text. They are trimmed
//! and compared case-insensitively exactly once, here, so rule logic works on
//! enumerations instead of scattered string checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lower-case and trim a tracker-supplied name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A tracker account (assignee or reporter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account_id: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(account_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Workflow status, normalised
///
/// Only the states the rules reason about get their own variant; every other
/// workflow state keeps its original name in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    InProgress,
    Done,
    Closed,
    Other(String),
}

impl Status {
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "in progress" => Self::InProgress,
            "done" => Self::Done,
            "closed" => Self::Closed,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    /// Already being worked on, or finished
    pub fn is_active_or_terminal(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("In Progress"),
            Self::Done => f.write_str("Done"),
            Self::Closed => f.write_str("Closed"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Issue priority
///
/// The standard scale is Lowest < Low < Medium < High < Highest. `Critical` and
/// `Blocker` come from older Jira schemes and sit outside that scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Lowest,
    Low,
    Medium,
    High,
    Highest,
    Critical,
    Blocker,
    Other(String),
}

impl Priority {
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "lowest" => Self::Lowest,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "highest" => Self::Highest,
            "critical" => Self::Critical,
            "blocker" => Self::Blocker,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    /// High, Highest, Critical, or Blocker
    pub fn is_high_severity(&self) -> bool {
        matches!(
            self,
            Self::High | Self::Highest | Self::Critical | Self::Blocker
        )
    }

    /// The top tier of high severity: Highest, Critical, or Blocker
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Highest | Self::Critical | Self::Blocker)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lowest => "Lowest",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Highest => "Highest",
            Self::Critical => "Critical",
            Self::Blocker => "Blocker",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Issue category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    Bug,
    Story,
    Task,
    Epic,
    SubTask,
    Improvement,
    Other(String),
}

impl IssueType {
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "bug" => Self::Bug,
            "story" => Self::Story,
            "task" => Self::Task,
            "epic" => Self::Epic,
            "sub-task" => Self::SubTask,
            "improvement" => Self::Improvement,
            _ => Self::Other(name.trim().to_string()),
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bug => "Bug",
            Self::Story => "Story",
            Self::Task => "Task",
            Self::Epic => "Epic",
            Self::SubTask => "Sub-task",
            Self::Improvement => "Improvement",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Read-only view of the issue fields the rules reason about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    key: String,
    summary: String,
    status: Status,
    issue_type: IssueType,
    assignee: Option<Identity>,
    reporter: Option<Identity>,
    labels: BTreeSet<String>,
    priority: Option<Priority>,
}

impl IssueSnapshot {
    /// Start a snapshot with the fields every issue has
    pub fn new(
        key: impl Into<String>,
        status: Status,
        issue_type: IssueType,
    ) -> Self {
        Self {
            key: key.into(),
            summary: String::new(),
            status,
            issue_type,
            assignee: None,
            reporter: None,
            labels: BTreeSet::new(),
            priority: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_assignee(mut self, assignee: Option<Identity>) -> Self {
        self.assignee = assignee;
        self
    }

    pub fn with_reporter(mut self, reporter: Option<Identity>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Duplicate and blank labels are dropped
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels
            .into_iter()
            .map(Into::into)
            .filter(|l: &String| !l.trim().is_empty())
            .collect();
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn issue_type(&self) -> &IssueType {
        &self.issue_type
    }

    pub fn assignee(&self) -> Option<&Identity> {
        self.assignee.as_ref()
    }

    pub fn reporter(&self) -> Option<&Identity> {
        self.reporter.as_ref()
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn priority(&self) -> Option<&Priority> {
        self.priority.as_ref()
    }

    /// Assignee display name, or "Unassigned"
    pub fn assignee_name(&self) -> &str {
        self.assignee
            .as_ref()
            .map(|a| a.display_name.as_str())
            .unwrap_or("Unassigned")
    }
}

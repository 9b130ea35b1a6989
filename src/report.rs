//! Execution reports
//!
//! Every rule evaluated in a run yields exactly one [`Outcome`]. Outcomes are
//! the only error channel between the engine and its caller: expected
//! non-events are `Skipped` with a reason, remote failures are `Failed`.

use crate::retry::{RetryDecision, RetryableError};
use crate::rules::{ChangeField, RuleId};
use crate::tracker::{CommentId, TrackerError, TransitionId};
use std::fmt;

/// The remote mutation a rule performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Assigned { account_id: String },
    Transitioned { transition_id: TransitionId, name: String },
    Labeled { label: String },
    Commented { comment_id: Option<CommentId> },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Assigned { account_id } => write!(f, "assigned to {}", account_id),
            Mutation::Transitioned {
                transition_id,
                name,
            } => write!(f, "applied transition '{}' ({})", name, transition_id),
            Mutation::Labeled { label } => write!(f, "added label '{}'", label),
            Mutation::Commented {
                comment_id: Some(id),
            } => write!(f, "posted comment {}", id),
            Mutation::Commented { comment_id: None } => f.write_str("posted comment"),
        }
    }
}

/// Why a rule did nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The issue has no reporter to assign to
    MissingReporter,
    /// The reporter is already the assignee
    AlreadyAssignedToReporter,
    /// Nobody is assigned, so there is nothing to start
    NoAssignee,
    /// Status is already in progress, done, or closed
    AlreadyActive { status: String },
    /// No transition named like "progress" or "start"
    NoMatchingTransition { available: Vec<String> },
    /// The issue type has no label mapping
    NoLabelMapping { issue_type: String },
    /// The mapped label is already on the issue
    LabelAlreadyPresent { label: String },
    /// The new priority is not high severity
    PriorityBelowThreshold { priority: String },
    /// The rule reacts to a change the caller did not supply
    MissingChangeContext { expected: ChangeField },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingReporter => f.write_str("issue has no reporter"),
            SkipReason::AlreadyAssignedToReporter => f.write_str("already assigned to reporter"),
            SkipReason::NoAssignee => f.write_str("issue has no assignee"),
            SkipReason::AlreadyActive { status } => write!(f, "already in '{}'", status),
            SkipReason::NoMatchingTransition { available } => {
                write!(f, "no 'In Progress' transition (available: {:?})", available)
            }
            SkipReason::NoLabelMapping { issue_type } => {
                write!(f, "no label mapping for issue type '{}'", issue_type)
            }
            SkipReason::LabelAlreadyPresent { label } => {
                write!(f, "label '{}' already present", label)
            }
            SkipReason::PriorityBelowThreshold { priority } => {
                write!(f, "priority '{}' does not need an alert", priority)
            }
            SkipReason::MissingChangeContext { expected } => {
                write!(f, "no {} change supplied", expected)
            }
        }
    }
}

/// Class of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Auth,
    Transport,
}

impl FailureKind {
    pub fn of(error: &TrackerError) -> Self {
        match error {
            TrackerError::NotFound(_) => FailureKind::NotFound,
            TrackerError::Auth(_) => FailureKind::Auth,
            TrackerError::Transport { .. }
            | TrackerError::RateLimited { .. }
            | TrackerError::Decode(_) => FailureKind::Transport,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotFound => f.write_str("not found"),
            FailureKind::Auth => f.write_str("auth"),
            FailureKind::Transport => f.write_str("transport"),
        }
    }
}

/// Result of one rule on one issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(Mutation),
    Skipped(SkipReason),
    Failed { kind: FailureKind, detail: String },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<TrackerError> for Outcome {
    fn from(error: TrackerError) -> Self {
        Outcome::Failed {
            kind: FailureKind::of(&error),
            detail: error.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied(mutation) => write!(f, "applied: {}", mutation),
            Outcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            Outcome::Failed { kind, detail } => write!(f, "failed ({}): {}", kind, detail),
        }
    }
}

/// One rule's entry in a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: RuleId,
    pub outcome: Outcome,
}

/// Everything a single engine run produced, in rule order
///
/// When the issue could not be fetched, every rule that needed it is `Failed`
/// and the fetch error is kept in `fatal` so callers can decide to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub key: String,
    pub rules: Vec<RuleReport>,
    pub fatal: Option<TrackerError>,
}

impl ExecutionReport {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rules: Vec::new(),
            fatal: None,
        }
    }

    pub fn record(&mut self, rule: RuleId, outcome: Outcome) {
        self.rules.push(RuleReport { rule, outcome });
    }

    /// Whether the issue itself could not be fetched
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// `Err(self)` when the run was cut short by a fetch failure
    ///
    /// Lets a whole run go through [`crate::retry::with_retry`] while still
    /// handing the last partial report back to the caller.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.is_fatal() {
            Err(self)
        } else {
            Ok(self)
        }
    }

    /// Outcome of a specific rule, if it was evaluated
    pub fn outcome(&self, rule: RuleId) -> Option<&Outcome> {
        self.rules.iter().find(|r| r.rule == rule).map(|r| &r.outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.is_fatal() || self.rules.iter().any(|r| r.outcome.is_failed())
    }

    pub fn summary(&self) -> ReportSummary {
        let count = |pred: fn(&Outcome) -> bool| {
            self.rules.iter().filter(|r| pred(&r.outcome)).count()
        };
        ReportSummary {
            evaluated: self.rules.len(),
            applied: count(Outcome::is_applied),
            skipped: count(Outcome::is_skipped),
            failed: count(Outcome::is_failed),
        }
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fatal {
            Some(error) => write!(f, "{}: {}", self.key, error),
            None => write!(f, "{}: {}", self.key, self.summary()),
        }
    }
}

impl RetryableError for ExecutionReport {
    fn retry_decision(&self) -> RetryDecision {
        self.fatal
            .as_ref()
            .map(RetryableError::retry_decision)
            .unwrap_or(RetryDecision::NoRetry)
    }
}

/// Counts per outcome class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub evaluated: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} skipped, {} failed",
            self.applied, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_errors_become_failures() {
        let outcome = Outcome::from(TrackerError::Auth("HTTP 401".to_string()));
        assert_eq!(
            outcome,
            Outcome::Failed {
                kind: FailureKind::Auth,
                detail: "Authentication failed: HTTP 401".to_string()
            }
        );

        let outcome = Outcome::from(TrackerError::Decode("eof".to_string()));
        assert!(matches!(
            outcome,
            Outcome::Failed {
                kind: FailureKind::Transport,
                ..
            }
        ));
    }

    #[test]
    fn test_summary_counts() {
        let mut report = ExecutionReport::new("KAN-1");
        report.record(
            RuleId::ReassignToReporter,
            Outcome::Applied(Mutation::Assigned {
                account_id: "u1".to_string(),
            }),
        );
        report.record(
            RuleId::LabelByIssueType,
            Outcome::Skipped(SkipReason::LabelAlreadyPresent {
                label: "bug".to_string(),
            }),
        );
        report.record(
            RuleId::NotifyOnStatusChange,
            TrackerError::transport(Some(500), "oops").into(),
        );

        let summary = report.summary();
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!(report.has_failures());
        assert_eq!(summary.to_string(), "1 applied, 1 skipped, 1 failed");
        assert!(report.outcome(RuleId::AlertOnPriorityEscalation).is_none());
    }

    #[test]
    fn test_fatal_report_is_retryable_and_failed() {
        let mut report = ExecutionReport::new("KAN-9");
        report.record(
            RuleId::AlertOnPriorityEscalation,
            Outcome::Skipped(SkipReason::PriorityBelowThreshold {
                priority: "Low".to_string(),
            }),
        );
        assert!(report.clone().into_result().is_ok());
        assert_eq!(report.retry_decision(), RetryDecision::NoRetry);

        report.fatal = Some(TrackerError::transport(None, "connection reset"));
        assert!(report.has_failures());
        assert_eq!(report.retry_decision(), RetryDecision::Retry);
        assert_eq!(report.to_string(), "KAN-9: Transport error: connection reset");

        let partial = report.into_result().unwrap_err();
        assert_eq!(partial.rules.len(), 1);
    }

    #[test]
    fn test_comment_without_id_display() {
        let mutation = Mutation::Commented { comment_id: None };
        assert_eq!(mutation.to_string(), "posted comment");

        let mutation = Mutation::Commented {
            comment_id: Some(CommentId::new("10042")),
        };
        assert_eq!(mutation.to_string(), "posted comment 10042");
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::MissingChangeContext {
            expected: ChangeField::Priority,
        };
        assert_eq!(reason.to_string(), "no priority change supplied");
    }
}

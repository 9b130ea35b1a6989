//! Automation rules
//!
//! Each rule pairs a condition over an [`IssueSnapshot`] (plus an optional
//! [`ChangeContext`]) with an action performed through a [`TrackerClient`].
//! Rules hold no state; every side effect goes through the tracker.

mod auto_transition;
mod label_by_type;
mod notify_status_change;
mod priority_escalation;
mod reassign_to_reporter;

pub use auto_transition::AutoTransitionOnAssignmentRule;
pub use label_by_type::{label_for, LabelByIssueTypeRule};
pub use notify_status_change::NotifyOnStatusChangeRule;
pub use priority_escalation::AlertOnPriorityEscalationRule;
pub use reassign_to_reporter::ReassignToReporterRule;

use crate::report::{Outcome, SkipReason};
use crate::snapshot::{normalize_name, IssueSnapshot};
use crate::tracker::TrackerClient;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Timestamp format used in automated comments
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time in [`TIMESTAMP_FORMAT`]
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// The field a change context refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeField {
    Status,
    Priority,
    Other(String),
}

impl ChangeField {
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "status" => Self::Status,
            "priority" => Self::Priority,
            _ => Self::Other(name.trim().to_string()),
        }
    }
}

impl fmt::Display for ChangeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => f.write_str("status"),
            Self::Priority => f.write_str("priority"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A field change observed by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeContext {
    pub field: ChangeField,
    pub old_value: String,
    pub new_value: String,
}

impl ChangeContext {
    pub fn new(
        field: ChangeField,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            field,
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    pub fn status(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::new(ChangeField::Status, old, new)
    }

    pub fn priority(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::new(ChangeField::Priority, old, new)
    }
}

/// The change of `field` in `change`, or the skip reason when it is absent
pub(crate) fn require_change<'a>(
    change: Option<&'a ChangeContext>,
    field: ChangeField,
) -> Result<&'a ChangeContext, SkipReason> {
    match change {
        Some(c) if c.field == field => Ok(c),
        _ => Err(SkipReason::MissingChangeContext { expected: field }),
    }
}

/// Result of a rule's condition check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Skip(SkipReason),
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

impl From<Result<(), SkipReason>> for Verdict {
    fn from(result: Result<(), SkipReason>) -> Self {
        match result {
            Ok(()) => Verdict::Match,
            Err(reason) => Verdict::Skip(reason),
        }
    }
}

/// Trait for automation rules
#[async_trait]
pub trait Rule: Send + Sync {
    fn id(&self) -> RuleId;

    /// Check the change context alone, before any issue is fetched.
    /// Rules that act on current state only keep the default.
    fn check_change(&self, _change: Option<&ChangeContext>) -> Verdict {
        Verdict::Match
    }

    /// Check the rule's condition against a snapshot
    fn matches(&self, snapshot: &IssueSnapshot, change: Option<&ChangeContext>) -> Verdict;

    /// Perform the rule's action. Only called after `matches` returned `Match`.
    async fn execute(
        &self,
        tracker: &dyn TrackerClient,
        snapshot: &IssueSnapshot,
        change: Option<&ChangeContext>,
    ) -> Outcome;

    fn name(&self) -> &'static str {
        self.id().name()
    }
}

/// The built-in rules, in default evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleId {
    ReassignToReporter,
    AutoTransitionOnAssignment,
    NotifyOnStatusChange,
    LabelByIssueType,
    AlertOnPriorityEscalation,
}

impl RuleId {
    pub const ALL: [RuleId; 5] = [
        RuleId::ReassignToReporter,
        RuleId::AutoTransitionOnAssignment,
        RuleId::NotifyOnStatusChange,
        RuleId::LabelByIssueType,
        RuleId::AlertOnPriorityEscalation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RuleId::ReassignToReporter => "reassign-to-reporter",
            RuleId::AutoTransitionOnAssignment => "auto-transition-on-assignment",
            RuleId::NotifyOnStatusChange => "notify-on-status-change",
            RuleId::LabelByIssueType => "label-by-issue-type",
            RuleId::AlertOnPriorityEscalation => "alert-on-priority-escalation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RuleId::ReassignToReporter => "Assign the issue to the person who created it",
            RuleId::AutoTransitionOnAssignment => {
                "Move an assigned issue to 'In Progress' unless it is already active or finished"
            }
            RuleId::NotifyOnStatusChange => "Comment on the issue when its status changes",
            RuleId::LabelByIssueType => "Add a label derived from the issue type",
            RuleId::AlertOnPriorityEscalation => {
                "Comment an alert when priority is raised to High or above"
            }
        }
    }

    /// Instantiate the rule
    pub fn build(self) -> Box<dyn Rule> {
        match self {
            RuleId::ReassignToReporter => Box::new(ReassignToReporterRule),
            RuleId::AutoTransitionOnAssignment => Box::new(AutoTransitionOnAssignmentRule),
            RuleId::NotifyOnStatusChange => Box::new(NotifyOnStatusChangeRule),
            RuleId::LabelByIssueType => Box::new(LabelByIssueTypeRule),
            RuleId::AlertOnPriorityEscalation => Box::new(AlertOnPriorityEscalationRule),
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_name(s).replace('_', "-");
        RuleId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = RuleId::ALL.iter().map(|id| id.name()).collect();
                format!("Unknown rule '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_round_trip() {
        for id in RuleId::ALL {
            assert_eq!(id.name().parse::<RuleId>(), Ok(id));
            assert_eq!(id.build().id(), id);
        }
        assert_eq!(
            "Label_By_Issue_Type".parse::<RuleId>(),
            Ok(RuleId::LabelByIssueType)
        );
        assert!("escalate".parse::<RuleId>().is_err());
    }

    #[test]
    fn test_require_change_checks_field() {
        let status = ChangeContext::status("To Do", "Done");
        assert!(require_change(Some(&status), ChangeField::Status).is_ok());
        assert_eq!(
            require_change(Some(&status), ChangeField::Priority),
            Err(SkipReason::MissingChangeContext {
                expected: ChangeField::Priority
            })
        );
        assert!(require_change(None, ChangeField::Status).is_err());
    }

    #[test]
    fn test_change_field_from_name() {
        assert_eq!(ChangeField::from_name(" Status "), ChangeField::Status);
        assert_eq!(ChangeField::from_name("PRIORITY"), ChangeField::Priority);
        assert_eq!(
            ChangeField::from_name("resolution"),
            ChangeField::Other("resolution".to_string())
        );
    }

    #[test]
    fn test_timestamp_format_parses() {
        let stamp = timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
    }
}

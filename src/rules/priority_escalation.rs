//! Rule: Alert on priority escalation

use super::{require_change, timestamp, ChangeContext, ChangeField, Rule, RuleId, Verdict};
use crate::report::{Mutation, Outcome, SkipReason};
use crate::snapshot::{IssueSnapshot, Priority};
use crate::tracker::TrackerClient;
use async_trait::async_trait;

/// Comments an alert when an issue's priority is raised to High or above
pub struct AlertOnPriorityEscalationRule;

/// Marker for the top tier (Highest, Critical, Blocker)
pub const URGENT_MARKER: &str = "🔴";
/// Marker for plain High
pub const HIGH_MARKER: &str = "🟠";

/// Comment text for a priority escalation
pub fn escalation_message(
    old_priority: &str,
    new_priority: &str,
    assignee: &str,
    summary: &str,
    timestamp: &str,
) -> String {
    let marker = if Priority::from_name(new_priority).is_urgent() {
        URGENT_MARKER
    } else {
        HIGH_MARKER
    };
    format!(
        "{} PRIORITY ALERT\n\n\
         This issue's priority has been changed from '{}' to '{}'.\n\n\
         Assignee: {}\n\
         Summary: {}\n\
         Timestamp: {}\n\n\
         ⚠️ Please review this issue as soon as possible.\n\n\
         This is an automated alert from the Jira Automation system.",
        marker, old_priority, new_priority, assignee, summary, timestamp
    )
}

#[async_trait]
impl Rule for AlertOnPriorityEscalationRule {
    fn id(&self) -> RuleId {
        RuleId::AlertOnPriorityEscalation
    }

    /// Decided from the change alone, so low priorities never cost a fetch
    fn check_change(&self, change: Option<&ChangeContext>) -> Verdict {
        let change = match require_change(change, ChangeField::Priority) {
            Ok(c) => c,
            Err(reason) => return Verdict::Skip(reason),
        };
        if Priority::from_name(&change.new_value).is_high_severity() {
            Verdict::Match
        } else {
            Verdict::Skip(SkipReason::PriorityBelowThreshold {
                priority: change.new_value.clone(),
            })
        }
    }

    fn matches(&self, _snapshot: &IssueSnapshot, change: Option<&ChangeContext>) -> Verdict {
        self.check_change(change)
    }

    async fn execute(
        &self,
        tracker: &dyn TrackerClient,
        snapshot: &IssueSnapshot,
        change: Option<&ChangeContext>,
    ) -> Outcome {
        if let Verdict::Skip(reason) = self.check_change(change) {
            return Outcome::Skipped(reason);
        }
        let Some(change) = change else {
            return Outcome::Skipped(SkipReason::MissingChangeContext {
                expected: ChangeField::Priority,
            });
        };

        let summary = if snapshot.summary().trim().is_empty() {
            "No summary"
        } else {
            snapshot.summary()
        };
        let text = escalation_message(
            &change.old_value,
            &change.new_value,
            snapshot.assignee_name(),
            summary,
            &timestamp(),
        );
        match tracker.add_comment(snapshot.key(), &text).await {
            Ok(comment_id) => Outcome::Applied(Mutation::Commented { comment_id }),
            Err(e) => e.into(),
        }
    }
}

//! Rule: Notify on status change

use super::{require_change, timestamp, ChangeContext, ChangeField, Rule, RuleId, Verdict};
use crate::report::{Mutation, Outcome};
use crate::snapshot::IssueSnapshot;
use crate::tracker::TrackerClient;
use async_trait::async_trait;

/// Comments on an issue whenever the caller reports a status change
pub struct NotifyOnStatusChangeRule;

/// Comment text for a status change
pub fn status_change_message(
    old_status: &str,
    new_status: &str,
    assignee: &str,
    timestamp: &str,
) -> String {
    format!(
        "🔄 Status Update\n\n\
         Issue status changed from '{}' to '{}'\n\n\
         Assignee: {}\n\
         Timestamp: {}\n\n\
         This is an automated notification from the Jira Automation system.",
        old_status, new_status, assignee, timestamp
    )
}

#[async_trait]
impl Rule for NotifyOnStatusChangeRule {
    fn id(&self) -> RuleId {
        RuleId::NotifyOnStatusChange
    }

    fn check_change(&self, change: Option<&ChangeContext>) -> Verdict {
        require_change(change, ChangeField::Status).map(|_| ()).into()
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
        let change = match require_change(change, ChangeField::Status) {
            Ok(c) => c,
            Err(reason) => return Outcome::Skipped(reason),
        };

        let text = status_change_message(
            &change.old_value,
            &change.new_value,
            snapshot.assignee_name(),
            &timestamp(),
        );
        match tracker.add_comment(snapshot.key(), &text).await {
            Ok(comment_id) => Outcome::Applied(Mutation::Commented { comment_id }),
            Err(e) => e.into(),
        }
    }
}

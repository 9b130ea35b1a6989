//! Rule: Reassign to reporter

use super::{ChangeContext, Rule, RuleId, Verdict};
use crate::report::{Mutation, Outcome, SkipReason};
use crate::snapshot::IssueSnapshot;
use crate::tracker::{FieldPatch, TrackerClient};
use async_trait::async_trait;

/// Assigns a (newly created) issue to whoever reported it
pub struct ReassignToReporterRule;

#[async_trait]
impl Rule for ReassignToReporterRule {
    fn id(&self) -> RuleId {
        RuleId::ReassignToReporter
    }

    fn matches(&self, snapshot: &IssueSnapshot, _change: Option<&ChangeContext>) -> Verdict {
        match (snapshot.reporter(), snapshot.assignee()) {
            (None, _) => Verdict::Skip(SkipReason::MissingReporter),
            (Some(reporter), Some(assignee)) if reporter.account_id == assignee.account_id => {
                Verdict::Skip(SkipReason::AlreadyAssignedToReporter)
            }
            (Some(_), _) => Verdict::Match,
        }
    }

    async fn execute(
        &self,
        tracker: &dyn TrackerClient,
        snapshot: &IssueSnapshot,
        _change: Option<&ChangeContext>,
    ) -> Outcome {
        if let Verdict::Skip(reason) = self.matches(snapshot, None) {
            return Outcome::Skipped(reason);
        }
        let Some(reporter) = snapshot.reporter() else {
            return Outcome::Skipped(SkipReason::MissingReporter);
        };

        let patch = FieldPatch::assignee(reporter.account_id.clone());
        match tracker.update_fields(snapshot.key(), &patch).await {
            Ok(()) => Outcome::Applied(Mutation::Assigned {
                account_id: reporter.account_id.clone(),
            }),
            Err(e) => e.into(),
        }
    }
}

//! Rule: Auto-transition on assignment

use super::{ChangeContext, Rule, RuleId, Verdict};
use crate::report::{Mutation, Outcome, SkipReason};
use crate::snapshot::{normalize_name, IssueSnapshot};
use crate::tracker::{TrackerClient, Transition};
use async_trait::async_trait;
use tracing::debug;

/// Moves an assigned issue into "In Progress"
pub struct AutoTransitionOnAssignmentRule;

/// First transition whose name contains "progress" or is exactly "start".
///
/// Workflow names are free text, so this is a heuristic; listing order decides
/// between several candidates.
pub fn select_start_transition(transitions: &[Transition]) -> Option<&Transition> {
    transitions.iter().find(|t| {
        let name = normalize_name(&t.name);
        name.contains("progress") || name == "start"
    })
}

#[async_trait]
impl Rule for AutoTransitionOnAssignmentRule {
    fn id(&self) -> RuleId {
        RuleId::AutoTransitionOnAssignment
    }

    fn matches(&self, snapshot: &IssueSnapshot, _change: Option<&ChangeContext>) -> Verdict {
        if snapshot.assignee().is_none() {
            return Verdict::Skip(SkipReason::NoAssignee);
        }
        if snapshot.status().is_active_or_terminal() {
            return Verdict::Skip(SkipReason::AlreadyActive {
                status: snapshot.status().to_string(),
            });
        }
        Verdict::Match
    }

    async fn execute(
        &self,
        tracker: &dyn TrackerClient,
        snapshot: &IssueSnapshot,
        change: Option<&ChangeContext>,
    ) -> Outcome {
        if let Verdict::Skip(reason) = self.matches(snapshot, change) {
            return Outcome::Skipped(reason);
        }

        let transitions = match tracker.list_transitions(snapshot.key()).await {
            Ok(t) => t,
            Err(e) => return e.into(),
        };

        let Some(transition) = select_start_transition(&transitions) else {
            let available: Vec<String> = transitions.iter().map(|t| t.name.clone()).collect();
            debug!(key = %snapshot.key(), ?available, "No 'In Progress' transition available");
            return Outcome::Skipped(SkipReason::NoMatchingTransition { available });
        };

        match tracker.apply_transition(snapshot.key(), &transition.id).await {
            Ok(()) => Outcome::Applied(Mutation::Transitioned {
                transition_id: transition.id.clone(),
                name: transition.name.clone(),
            }),
            Err(e) => e.into(),
        }
    }
}

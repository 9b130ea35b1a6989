//! Rule: Label by issue type

use super::{ChangeContext, Rule, RuleId, Verdict};
use crate::report::{Mutation, Outcome, SkipReason};
use crate::snapshot::{IssueSnapshot, IssueType};
use crate::tracker::{FieldPatch, TrackerClient};
use async_trait::async_trait;

/// Adds a label derived from the issue type
pub struct LabelByIssueTypeRule;

/// Label for an issue type; unknown types have none
pub fn label_for(issue_type: &IssueType) -> Option<&'static str> {
    match issue_type {
        IssueType::Bug => Some("bug"),
        IssueType::Story => Some("feature"),
        IssueType::Task => Some("task"),
        IssueType::Epic => Some("epic"),
        IssueType::SubTask => Some("subtask"),
        IssueType::Improvement => Some("enhancement"),
        IssueType::Other(_) => None,
    }
}

impl LabelByIssueTypeRule {
    fn mapped_label(snapshot: &IssueSnapshot) -> Result<&'static str, SkipReason> {
        let label = label_for(snapshot.issue_type()).ok_or_else(|| SkipReason::NoLabelMapping {
            issue_type: snapshot.issue_type().to_string(),
        })?;
        if snapshot.has_label(label) {
            return Err(SkipReason::LabelAlreadyPresent {
                label: label.to_string(),
            });
        }
        Ok(label)
    }
}

#[async_trait]
impl Rule for LabelByIssueTypeRule {
    fn id(&self) -> RuleId {
        RuleId::LabelByIssueType
    }

    fn matches(&self, snapshot: &IssueSnapshot, _change: Option<&ChangeContext>) -> Verdict {
        Self::mapped_label(snapshot).map(|_| ()).into()
    }

    async fn execute(
        &self,
        tracker: &dyn TrackerClient,
        snapshot: &IssueSnapshot,
        _change: Option<&ChangeContext>,
    ) -> Outcome {
        let label = match Self::mapped_label(snapshot) {
            Ok(l) => l,
            Err(reason) => return Outcome::Skipped(reason),
        };

        // Send the full union so a repeated run can never duplicate the label
        let mut labels = snapshot.labels().clone();
        labels.insert(label.to_string());

        match tracker
            .update_fields(snapshot.key(), &FieldPatch::labels(labels))
            .await
        {
            Ok(()) => Outcome::Applied(Mutation::Labeled {
                label: label.to_string(),
            }),
            Err(e) => e.into(),
        }
    }
}

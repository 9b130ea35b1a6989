//! In-memory tracker
//!
//! Holds issues in process and records every call made against it. Mutations
//! are applied to the stored issue, so a later fetch observes them the way a
//! real tracker would. Failures can be injected per operation.

use super::{
    CommentId, FieldPatch, FieldValue, TrackerClient, TrackerError, Transition, TransitionId,
};
use crate::snapshot::{Identity, IssueSnapshot, Status};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Operation kinds, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    FetchIssue,
    UpdateFields,
    ListTransitions,
    ApplyTransition,
    AddComment,
}

impl CallKind {
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            CallKind::UpdateFields | CallKind::ApplyTransition | CallKind::AddComment
        )
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    FetchIssue { key: String },
    UpdateFields { key: String, patch: FieldPatch },
    ListTransitions { key: String },
    ApplyTransition { key: String, transition: TransitionId },
    AddComment { key: String, text: String },
}

impl TrackerCall {
    pub fn kind(&self) -> CallKind {
        match self {
            TrackerCall::FetchIssue { .. } => CallKind::FetchIssue,
            TrackerCall::UpdateFields { .. } => CallKind::UpdateFields,
            TrackerCall::ListTransitions { .. } => CallKind::ListTransitions,
            TrackerCall::ApplyTransition { .. } => CallKind::ApplyTransition,
            TrackerCall::AddComment { .. } => CallKind::AddComment,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    issues: HashMap<String, IssueSnapshot>,
    transitions: HashMap<String, Vec<Transition>>,
    comments: HashMap<String, Vec<String>>,
    failures: HashMap<CallKind, TrackerError>,
    calls: Vec<TrackerCall>,
    next_comment_id: u64,
}

/// Tracker backed by a map of issues
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    state: Mutex<MemoryState>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store (or replace) an issue
    pub fn insert_issue(&self, snapshot: IssueSnapshot) {
        self.state()
            .issues
            .insert(snapshot.key().to_string(), snapshot);
    }

    pub fn with_issue(self, snapshot: IssueSnapshot) -> Self {
        self.insert_issue(snapshot);
        self
    }

    /// Set the transitions offered for an issue, in listing order
    pub fn set_transitions(&self, key: &str, transitions: Vec<Transition>) {
        self.state().transitions.insert(key.to_string(), transitions);
    }

    pub fn with_transitions(self, key: &str, transitions: Vec<Transition>) -> Self {
        self.set_transitions(key, transitions);
        self
    }

    /// Make every call of `kind` fail with `error` until cleared
    pub fn fail_on(&self, kind: CallKind, error: TrackerError) {
        self.state().failures.insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Current stored version of an issue
    pub fn issue(&self, key: &str) -> Option<IssueSnapshot> {
        self.state().issues.get(key).cloned()
    }

    /// Comments posted to an issue, oldest first
    pub fn comments(&self, key: &str) -> Vec<String> {
        self.state().comments.get(key).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        self.state().calls.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn mutation_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.kind().is_mutation())
            .count()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Record the call, then report an injected failure if one is set
    fn begin(&self, state: &mut MemoryState, call: TrackerCall) -> Result<(), TrackerError> {
        let kind = call.kind();
        state.calls.push(call);
        match state.failures.get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Resolve an account id against the identities already on the issue
fn identity_for(snapshot: &IssueSnapshot, account_id: &str) -> Identity {
    snapshot
        .reporter()
        .into_iter()
        .chain(snapshot.assignee())
        .find(|i| i.account_id == account_id)
        .cloned()
        .unwrap_or_else(|| Identity::new(account_id, account_id))
}

#[async_trait]
impl TrackerClient for InMemoryTracker {
    async fn fetch_issue(&self, key: &str) -> Result<IssueSnapshot, TrackerError> {
        let mut state = self.state();
        self.begin(&mut state, TrackerCall::FetchIssue { key: key.to_string() })?;
        state
            .issues
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(key.to_string()))
    }

    async fn update_fields(&self, key: &str, patch: &FieldPatch) -> Result<(), TrackerError> {
        let mut state = self.state();
        self.begin(
            &mut state,
            TrackerCall::UpdateFields {
                key: key.to_string(),
                patch: patch.clone(),
            },
        )?;

        let current = state
            .issues
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(key.to_string()))?;

        let mut updated = current.clone();
        for (field, value) in patch.iter() {
            updated = match (field.as_str(), value) {
                (FieldPatch::ASSIGNEE, FieldValue::Account(id)) => {
                    updated.with_assignee(Some(identity_for(&current, id)))
                }
                (FieldPatch::LABELS, FieldValue::Labels(labels)) => {
                    updated.with_labels(labels.iter().cloned())
                }
                (other, _) => {
                    return Err(TrackerError::transport(
                        Some(400),
                        format!("Field '{}' cannot be set", other),
                    ))
                }
            };
        }
        state.issues.insert(key.to_string(), updated);
        Ok(())
    }

    async fn list_transitions(&self, key: &str) -> Result<Vec<Transition>, TrackerError> {
        let mut state = self.state();
        self.begin(&mut state, TrackerCall::ListTransitions { key: key.to_string() })?;
        if !state.issues.contains_key(key) {
            return Err(TrackerError::NotFound(key.to_string()));
        }
        Ok(state.transitions.get(key).cloned().unwrap_or_default())
    }

    async fn apply_transition(
        &self,
        key: &str,
        transition: &TransitionId,
    ) -> Result<(), TrackerError> {
        let mut state = self.state();
        self.begin(
            &mut state,
            TrackerCall::ApplyTransition {
                key: key.to_string(),
                transition: transition.clone(),
            },
        )?;

        let target = state
            .transitions
            .get(key)
            .and_then(|ts| ts.iter().find(|t| &t.id == transition))
            .map(|t| t.target_status.clone())
            .ok_or_else(|| {
                TrackerError::transport(
                    Some(400),
                    format!("Transition {} is not valid for {}", transition, key),
                )
            })?;

        let current = state
            .issues
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(key.to_string()))?;
        state
            .issues
            .insert(key.to_string(), current.with_status(Status::from_name(&target)));
        Ok(())
    }

    async fn add_comment(&self, key: &str, text: &str) -> Result<Option<CommentId>, TrackerError> {
        let mut state = self.state();
        self.begin(
            &mut state,
            TrackerCall::AddComment {
                key: key.to_string(),
                text: text.to_string(),
            },
        )?;
        if !state.issues.contains_key(key) {
            return Err(TrackerError::NotFound(key.to_string()));
        }

        state.next_comment_id += 1;
        let id = CommentId::new(format!("{}", 10000 + state.next_comment_id));
        state
            .comments
            .entry(key.to_string())
            .or_default()
            .push(text.to_string());
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::IssueType;

    fn tracker() -> InMemoryTracker {
        InMemoryTracker::new()
            .with_issue(
                IssueSnapshot::new("KAN-1", Status::from_name("To Do"), IssueType::Task)
                    .with_reporter(Some(Identity::new("u1", "Alice"))),
            )
            .with_transitions("KAN-1", vec![Transition::new("21", "Done", "Done")])
    }

    #[tokio::test]
    async fn test_fetch_unknown_issue_is_not_found() {
        let tracker = tracker();
        let err = tracker.fetch_issue("KAN-404").await.unwrap_err();
        assert_eq!(err, TrackerError::NotFound("KAN-404".to_string()));
        assert_eq!(tracker.call_count(CallKind::FetchIssue), 1);
    }

    #[tokio::test]
    async fn test_update_is_visible_on_refetch() {
        let tracker = tracker();
        let before = tracker.fetch_issue("KAN-1").await.unwrap();

        tracker
            .update_fields("KAN-1", &FieldPatch::assignee("u1"))
            .await
            .unwrap();

        assert!(before.assignee().is_none());
        let after = tracker.fetch_issue("KAN-1").await.unwrap();
        assert_eq!(after.assignee_name(), "Alice");
    }

    #[tokio::test]
    async fn test_apply_transition_moves_status() {
        let tracker = tracker();
        tracker
            .apply_transition("KAN-1", &TransitionId::new("21"))
            .await
            .unwrap();
        assert_eq!(tracker.issue("KAN-1").unwrap().status(), &Status::Done);

        let err = tracker
            .apply_transition("KAN-1", &TransitionId::new("99"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Transport { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let tracker = tracker();
        tracker.fail_on(CallKind::AddComment, TrackerError::transport(Some(500), "boom"));

        assert!(tracker.add_comment("KAN-1", "hi").await.is_err());
        assert_eq!(tracker.mutation_count(), 1);
        assert!(tracker.comments("KAN-1").is_empty());

        tracker.clear_failures();
        let id = tracker.add_comment("KAN-1", "hi").await.unwrap();
        assert_eq!(id, Some(CommentId::new("10001")));
        assert_eq!(tracker.comments("KAN-1"), vec!["hi".to_string()]);
    }
}

//! Rule engine - evaluates rules against a freshly fetched issue
//!
//! A run is fetch → decide → act → report for each rule, in order. The issue is
//! fetched at most once per run and shared by all rules; it is not fetched at
//! all when every rule already skips on the change context alone. Rules run
//! one after another, so mutations on the same issue never overlap.

use crate::report::{ExecutionReport, Outcome};
use crate::rules::{ChangeContext, Rule, RuleId, Verdict};
use crate::snapshot::IssueSnapshot;
use crate::tracker::TrackerClient;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of issues processed at once by [`RuleEngine::run_batch`]
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Runs an ordered set of rules against issues on one tracker
pub struct RuleEngine {
    tracker: Arc<dyn TrackerClient>,
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// Engine with every built-in rule in default order
    pub fn new(tracker: Arc<dyn TrackerClient>) -> Self {
        Self::with_rules(tracker, &RuleId::ALL)
    }

    /// Engine with the given built-in rules, in the given order
    pub fn with_rules(tracker: Arc<dyn TrackerClient>, rules: &[RuleId]) -> Self {
        Self {
            tracker,
            rules: rules.iter().map(|id| id.build()).collect(),
        }
    }

    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Evaluate every rule for one issue
    ///
    /// Always yields one outcome per evaluated rule. Failures of individual
    /// rule actions are `Outcome::Failed` and never stop the remaining rules.
    /// When the issue itself cannot be fetched, the rule that asked for it and
    /// every later rule that needs it are `Failed` with the fetch error, rules
    /// that decide from the change alone still report their own outcome, and
    /// the error is kept in [`ExecutionReport::fatal`].
    pub async fn run(&self, key: &str, change: Option<&ChangeContext>) -> ExecutionReport {
        let mut report = ExecutionReport::new(key);
        let mut cached: Option<IssueSnapshot> = None;

        for rule in &self.rules {
            if let Verdict::Skip(reason) = rule.check_change(change) {
                debug!(key = %key, rule = rule.name(), reason = %reason, "Rule skipped");
                report.record(rule.id(), Outcome::Skipped(reason));
                continue;
            }

            if let Some(error) = &report.fatal {
                let outcome = Outcome::from(error.clone());
                log_outcome(key, rule.as_ref(), &outcome);
                report.record(rule.id(), outcome);
                continue;
            }

            let snapshot = match cached.take() {
                Some(s) => s,
                None => {
                    debug!(key = %key, "Fetching issue snapshot");
                    match self.tracker.fetch_issue(key).await {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(key = %key, error = %e, "Could not fetch issue");
                            let outcome = Outcome::from(e.clone());
                            log_outcome(key, rule.as_ref(), &outcome);
                            report.record(rule.id(), outcome);
                            report.fatal = Some(e);
                            continue;
                        }
                    }
                }
            };

            let outcome = match rule.matches(&snapshot, change) {
                Verdict::Skip(reason) => Outcome::Skipped(reason),
                Verdict::Match => {
                    rule.execute(self.tracker.as_ref(), &snapshot, change)
                        .await
                }
            };
            log_outcome(key, rule.as_ref(), &outcome);
            report.record(rule.id(), outcome);

            cached = Some(snapshot);
        }

        let summary = report.summary();
        info!(
            key = %key,
            applied = summary.applied,
            skipped = summary.skipped,
            failed = summary.failed,
            fatal = report.is_fatal(),
            "Rule run complete"
        );
        report
    }

    /// Run the rules for several issues, up to `concurrency` at a time
    ///
    /// Duplicate keys are collapsed so no issue is mutated by two runs at
    /// once. Reports come back in first-seen key order.
    pub async fn run_batch(
        &self,
        keys: &[String],
        change: Option<&ChangeContext>,
        concurrency: usize,
    ) -> Vec<ExecutionReport> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = keys
            .iter()
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect();

        stream::iter(unique)
            .map(|key| async move { self.run(&key, change).await })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

fn log_outcome(key: &str, rule: &dyn Rule, outcome: &Outcome) {
    match outcome {
        Outcome::Applied(mutation) => {
            info!(key = %key, rule = rule.name(), mutation = %mutation, "Rule applied")
        }
        Outcome::Skipped(reason) => {
            debug!(key = %key, rule = rule.name(), reason = %reason, "Rule skipped")
        }
        Outcome::Failed { kind, detail } => {
            warn!(key = %key, rule = rule.name(), kind = %kind, detail = %detail, "Rule failed")
        }
    }
}

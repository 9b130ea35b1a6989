//! jira-automation - rule-driven automation for Jira Cloud issues
//!
//! Evaluates a fixed set of automation rules against a single issue and
//! applies the resulting mutations through the Jira REST API, producing a
//! per-rule execution report.
//!
//! # Architecture
//!
//! - **snapshot**: Read-only view of an issue as fetched at the start of a run
//! - **tracker**: Tracker client port, the Jira Cloud adapter and an in-memory double
//! - **rules**: The built-in rules (reassign, transition, notify, label, alert)
//! - **engine**: Fetch → decide → act → report orchestration
//! - **report**: Per-rule outcomes (applied / skipped / failed)
//! - **config**: Configuration file, environment and validation
//! - **retry**: Caller-side retry with backoff

// Core modules
pub mod engine;
pub mod error;
pub mod report;
pub mod rules;
pub mod snapshot;
pub mod tracker;

// Ambient
pub mod config;
pub mod logging;
pub mod retry;
pub mod style;

// Re-exports
pub use engine::RuleEngine;
pub use error::{AutomationError, Result};
pub use report::{ExecutionReport, Outcome};
pub use rules::{ChangeContext, RuleId};
pub use snapshot::IssueSnapshot;
pub use tracker::{TrackerClient, TrackerError};

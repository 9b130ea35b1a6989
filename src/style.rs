//! Terminal styling utilities
//!
//! Consistent colors for rule reports. Uses crossterm for cross-platform
//! terminal colors.

use crate::report::{Outcome, ReportSummary};
use crossterm::style::{StyledContent, Stylize};

/// Outcome tag colors
/// - applied: Green
/// - skipped: Dim
/// - failed: Red
pub fn outcome_tag(outcome: &Outcome) -> StyledContent<&'static str> {
    match outcome {
        Outcome::Applied(_) => "applied".green().bold(),
        Outcome::Skipped(_) => "skipped".dark_grey(),
        Outcome::Failed { .. } => "failed".red().bold(),
    }
}

/// Outcome indicator
pub fn outcome_indicator(outcome: &Outcome) -> StyledContent<&'static str> {
    match outcome {
        Outcome::Applied(_) => "✓".green(),
        Outcome::Skipped(_) => "○".dark_grey(),
        Outcome::Failed { .. } => "✗".red(),
    }
}

/// Detail text after the tag: the mutation, skip reason or failure
pub fn outcome_detail(outcome: &Outcome) -> StyledContent<String> {
    match outcome {
        Outcome::Applied(mutation) => mutation.to_string().white(),
        Outcome::Skipped(reason) => reason.to_string().dark_grey(),
        Outcome::Failed { kind, detail } => format!("{}: {}", kind, detail).red(),
    }
}

/// Rule names
pub fn rule_name(name: &str) -> StyledContent<String> {
    name.to_string().cyan()
}

/// Issue key styling
pub fn issue_key(key: &str) -> StyledContent<String> {
    key.to_string().bold()
}

/// Summary line counts, colored only when non-zero
pub fn summary(summary: &ReportSummary) -> String {
    let count = |n: usize, label: &str, paint: fn(String) -> StyledContent<String>| {
        let text = format!("{} {}", n, label);
        if n == 0 {
            text.dark_grey().to_string()
        } else {
            paint(text).to_string()
        }
    };
    format!(
        "{}, {}, {}",
        count(summary.applied, "applied", |s| s.green()),
        count(summary.skipped, "skipped", |s| s.white()),
        count(summary.failed, "failed", |s| s.red()),
    )
}

/// Section headers
pub fn header(text: &str) -> StyledContent<String> {
    text.to_string().bold()
}

/// Dim/muted text
pub fn dim(text: &str) -> StyledContent<String> {
    text.to_string().dark_grey()
}

/// Success text
pub fn success(text: &str) -> StyledContent<String> {
    text.to_string().green()
}

/// Warning text
pub fn warning(text: &str) -> StyledContent<String> {
    text.to_string().yellow()
}

/// Error text
pub fn error(text: &str) -> StyledContent<String> {
    text.to_string().red()
}

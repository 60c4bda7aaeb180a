//! Operator alerts: fire a webhook when the problematic-state set changes
//! between two consecutive poll runs. No webhook configured means alerts
//! are silently disabled; a failed delivery is logged, never fatal.

pub mod webhook;

use std::collections::BTreeSet;

use chrono::Utc;

pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub pipeline: String,
    /// States flagged now that were clean last run.
    pub newly_flagged: Vec<String>,
    /// States clean now that were flagged last run.
    pub cleared: Vec<String>,
    /// The full problematic set after this run.
    pub problematic: Vec<String>,
    pub timestamp_iso: String, // UTC ISO 8601
}

/// Diff two consecutive problematic sets into an alert. `None` when nothing
/// changed, so callers can skip delivery entirely.
pub fn detect_change(
    pipeline: &str,
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
) -> Option<AlertPayload> {
    if previous == current {
        return None;
    }
    Some(AlertPayload {
        pipeline: pipeline.to_string(),
        newly_flagged: current.difference(previous).cloned().collect(),
        cleared: previous.difference(current).cloned().collect(),
        problematic: current.iter().cloned().collect(),
        timestamp_iso: Utc::now().to_rfc3339(),
    })
}

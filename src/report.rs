// src/report.rs
//! Report building: per-state metrics → classification → the report
//! artifact consumed by the curator and the dashboard.
//!
//! `build` is a pure function of its inputs. Persistence lives at the
//! bottom of this module; the artifact on disk is superseded wholesale by
//! the next run, never patched.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::scoring::StateMetrics;

pub const DEFAULT_REPORT_STATE_PATH: &str = "state/last_report.json";

/// Classification thresholds. Either signal alone flags a state:
/// low quality (average score) or low redundancy (accessible count).
pub const PROBLEM_AVG_SCORE_MIN: f64 = 0.3;
pub const PROBLEM_MIN_ACCESSIBLE: usize = 3;

pub fn is_problematic(metrics: &StateMetrics) -> bool {
    metrics.average_score < PROBLEM_AVG_SCORE_MIN
        || metrics.accessible_sources < PROBLEM_MIN_ACCESSIBLE
}

/// One row of the flat `topSources`/`failedSources` arrays. Rows carry the
/// originating pipeline so consumers mixing artifacts can tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub pipeline: String,
    pub state: String,
    pub url: String,
    pub accessible: bool,
    pub score: f64,
}

/// Top-level output of one poll run. Immutable once written; the next run
/// replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub pipeline: String,
    pub generated_at: u64, // unix seconds
    /// Fingerprint of the registry this run polled, so an operator can tell
    /// whether the report still describes the current configuration.
    pub registry_fingerprint: String,
    pub total_sources_evaluated: usize,
    pub metrics_by_state: BTreeMap<String, StateMetrics>,
    pub problematic_states: BTreeSet<String>,
    pub top_sources: Vec<SourceEntry>,
    pub failed_sources: Vec<SourceEntry>,
}

/// Condensed view for logs, CLI output, and the summary endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub pipeline: String,
    pub generated_at: u64,
    pub registry_fingerprint: String,
    pub states_evaluated: usize,
    pub total_sources_evaluated: usize,
    pub accessible_sources: usize,
    pub problematic_states: Vec<String>,
}

impl Report {
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            pipeline: self.pipeline.clone(),
            generated_at: self.generated_at,
            registry_fingerprint: self.registry_fingerprint.clone(),
            states_evaluated: self.metrics_by_state.len(),
            total_sources_evaluated: self.total_sources_evaluated,
            accessible_sources: self
                .metrics_by_state
                .values()
                .map(|m| m.accessible_sources)
                .sum(),
            problematic_states: self.problematic_states.iter().cloned().collect(),
        }
    }
}

/// Assemble the run report from per-state metrics. Pure; no I/O.
pub fn build(
    pipeline: &str,
    registry_fingerprint: &str,
    generated_at: u64,
    metrics_by_state: BTreeMap<String, StateMetrics>,
) -> Report {
    let problematic_states: BTreeSet<String> = metrics_by_state
        .iter()
        .filter(|(_, m)| is_problematic(m))
        .map(|(code, _)| code.clone())
        .collect();
    let total_sources_evaluated = metrics_by_state.values().map(|m| m.total_sources).sum();

    let mut top_sources = Vec::new();
    let mut failed_sources = Vec::new();
    for (code, metrics) in &metrics_by_state {
        for scored in &metrics.sources {
            let entry = SourceEntry {
                pipeline: pipeline.to_string(),
                state: code.clone(),
                url: scored.fetch.url.clone(),
                accessible: scored.accessible,
                score: scored.score,
            };
            if scored.accessible {
                top_sources.push(entry);
            } else {
                failed_sources.push(entry);
            }
        }
    }
    // Deterministic artifact: best first, ties broken by state then url.
    top_sources.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.state.cmp(&b.state))
            .then_with(|| a.url.cmp(&b.url))
    });
    failed_sources.sort_by(|a, b| a.state.cmp(&b.state).then_with(|| a.url.cmp(&b.url)));

    Report {
        pipeline: pipeline.to_string(),
        generated_at,
        registry_fingerprint: registry_fingerprint.to_string(),
        total_sources_evaluated,
        metrics_by_state,
        problematic_states,
        top_sources,
        failed_sources,
    }
}

/* ----------------------------
Shared handle + persistence
---------------------------- */

/// Latest report, shared between the scheduler and the HTTP API.
#[derive(Clone, Default)]
pub struct ReportHandle {
    inner: Arc<RwLock<Option<Report>>>,
}

impl ReportHandle {
    pub fn set(&self, report: Report) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(report);
        }
    }

    pub fn get(&self) -> Option<Report> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }
}

pub fn write_report(report: &Report, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(report)?)?;
    Ok(())
}

/// Tolerant read: a missing or unreadable artifact is `None`, never a crash.
pub fn read_report(path: &Path) -> Option<Report> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(target: "poll", error = %e, "last report unreadable; ignoring");
            None
        }
    }
}

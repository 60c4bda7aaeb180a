//! history.rs — in-memory log of recent poll runs for the dashboard and
//! for problematic-set change detection between consecutive runs.

use std::sync::Mutex;

use serde::Serialize;

use crate::report::Report;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEntry {
    pub ts_unix: u64,
    pub registry_fingerprint: String,
    pub total_sources: usize,
    pub accessible_sources: usize,
    pub problematic_states: Vec<String>,
}

#[derive(Debug)]
pub struct History {
    inner: Mutex<Vec<RunEntry>>,
    cap: usize,
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }

    pub fn push(&self, report: &Report) {
        let summary = report.summary();
        let entry = RunEntry {
            ts_unix: report.generated_at,
            registry_fingerprint: report.registry_fingerprint.clone(),
            total_sources: summary.total_sources_evaluated,
            accessible_sources: summary.accessible_sources,
            problematic_states: summary.problematic_states,
        };

        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunEntry> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let len = v.len();
        let start = len.saturating_sub(n);
        v[start..].to_vec()
    }
}

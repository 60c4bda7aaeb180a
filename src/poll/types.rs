// src/poll/types.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::registry::SourceCategory;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_DEADLINE_SECS: u64 = 300;
pub const DEFAULT_PIPELINE_ID: &str = "cannabis-hemp-poller";

/// Raw outcome of probing one URL, before ordering and scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: Option<u16>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    /// Decoded body, kept only for 2xx responses and capped, for marker checks.
    pub body_excerpt: Option<String>,
    /// `Last-Modified` response header as unix seconds, when parseable.
    pub last_modified_unix: Option<u64>,
}

impl ProbeOutcome {
    /// Synthesized result for a fetch that never ran because the poll run's
    /// global deadline had already passed.
    pub fn deadline_exceeded() -> Self {
        Self {
            error: Some("timeout".to_string()),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
pub trait UrlProber: Send + Sync {
    /// Probe one URL within `timeout`. Transport failures come back as data
    /// (`error` set, `status` empty), never as a panic or early return.
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
    fn name(&self) -> &'static str;
}

/// Outcome of probing one registered source. Created fresh each poll cycle
/// and persisted only inside the current report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub state: String,
    pub category: SourceCategory,
    pub url: String,
    pub http_status: Option<u16>,
    pub reachable: bool,
    pub latency_ms: Option<u64>,
    #[serde(rename = "errorMessage")]
    pub error: Option<String>,
    pub observed_at: u64, // unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub last_modified_unix: Option<u64>,
    /// Marker-check input only; dropped from the serialized report.
    #[serde(skip)]
    pub body_excerpt: Option<String>,
}

/// Knobs for one poll run.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Per-request timeout. No retries within a run; a failed source waits
    /// for the next scheduled cycle.
    pub timeout: Duration,
    /// Worker limit across all in-flight fetches.
    pub concurrency: usize,
    /// Global budget for the whole run; fetches past it become timeouts.
    pub deadline: Duration,
    /// Identifier stamped on every report row this run produces.
    pub pipeline: String,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            pipeline: DEFAULT_PIPELINE_ID.to_string(),
        }
    }
}

impl PollOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_pipeline<S: Into<String>>(mut self, pipeline: S) -> Self {
        self.pipeline = pipeline.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceCategory;

    #[test]
    fn fetch_result_serializes_with_report_field_names() {
        let fetch = FetchResult {
            state: "AR".into(),
            category: SourceCategory::News,
            url: "https://ar.gov/mmj-news".into(),
            http_status: Some(200),
            reachable: true,
            latency_ms: Some(120),
            error: None,
            observed_at: 1_700_000_000,
            last_modified_unix: None,
            body_excerpt: Some("never serialized".into()),
        };
        let json = serde_json::to_value(&fetch).unwrap();
        assert_eq!(json["httpStatus"], 200);
        assert_eq!(json["latencyMs"], 120);
        assert_eq!(json["observedAt"], 1_700_000_000u64);
        assert_eq!(json["category"], "news");
        assert!(json["errorMessage"].is_null());
        assert!(json.get("bodyExcerpt").is_none());
        assert!(json.get("body_excerpt").is_none());
    }

    #[test]
    fn timeout_failure_shape() {
        let outcome = ProbeOutcome::deadline_exceeded();
        assert_eq!(outcome.error.as_deref(), Some("timeout"));
        assert!(outcome.status.is_none());
        assert!(outcome.latency_ms.is_none());
    }

    #[test]
    fn options_builders_clamp_concurrency() {
        let opts = PollOptions::default().with_concurrency(0);
        assert_eq!(opts.concurrency, 1);
    }
}

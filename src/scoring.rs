// src/scoring.rs
//! Scoring: fetch outcome → score in [0,1], plus per-state aggregation.
//!
//! Base score comes from reachability alone; configured content markers can
//! only pull it down. Aggregation over zero sources is a defined outcome
//! (`averageScore = 0`), never a divide-by-zero.

use serde::{Deserialize, Serialize};

use crate::markers::MarkerEngine;
use crate::poll::types::FetchResult;

pub const SCORE_OK: f64 = 1.0;
pub const SCORE_REDIRECT: f64 = 0.5;
pub const SCORE_UNREACHABLE: f64 = 0.0;

/// A fetch result augmented with its score for the cycle. One per fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSource {
    #[serde(flatten)]
    pub fetch: FetchResult,
    pub score: f64,
    pub accessible: bool,
}

/// Aggregate over one state's scored sources for one poll cycle. Recomputed
/// from scratch each cycle, never incrementally updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMetrics {
    pub total_sources: usize,
    pub accessible_sources: usize,
    pub average_score: f64,
    pub sources: Vec<ScoredSource>,
}

/// Reachability-only score: 1.0 for 2xx, 0.5 for a redirect, 0.0 otherwise.
pub fn base_score(fetch: &FetchResult) -> f64 {
    match fetch.http_status {
        Some(s) if (200..=299).contains(&s) => SCORE_OK,
        Some(s) if (300..=399).contains(&s) => SCORE_REDIRECT,
        _ => SCORE_UNREACHABLE,
    }
}

/// Score one fetch. A body that carries none of its category's markers is
/// multiplied by the marker penalty; a body with a hit, or no body, or no
/// configured markers, keeps the base score.
pub fn score(fetch: FetchResult, markers: &MarkerEngine) -> ScoredSource {
    let mut score = base_score(&fetch);
    if let Some(body) = fetch.body_excerpt.as_deref() {
        if markers.matches(fetch.category, body) == Some(false) {
            score = (score * markers.penalty()).clamp(0.0, 1.0);
        }
    }
    ScoredSource {
        accessible: fetch.reachable,
        score,
        fetch,
    }
}

/// Fold one state's scored sources into its cycle metrics.
pub fn aggregate(scored: Vec<ScoredSource>) -> StateMetrics {
    let total = scored.len();
    let accessible = scored.iter().filter(|s| s.accessible).count();
    let average = if total == 0 {
        0.0
    } else {
        scored.iter().map(|s| s.score).sum::<f64>() / total as f64
    };
    StateMetrics {
        total_sources: total,
        accessible_sources: accessible,
        average_score: average,
        sources: scored,
    }
}

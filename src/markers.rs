// src/markers.rs
//! Content-marker policy: per-category keyword lists compiled into
//! case-insensitive word-boundary matchers. The lists are domain content,
//! so they live in external TOML, not in code; a reachable page whose body
//! carries none of its category's markers gets its score multiplied by the
//! configured penalty. Markers only ever pull a score down.

use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::registry::SourceCategory;

// --- env defaults & names ---
pub const DEFAULT_MARKERS_CONFIG_PATH: &str = "config/markers.toml";
pub const DEFAULT_MARKER_PENALTY: f64 = 0.5;

pub const ENV_MARKERS_CONFIG_PATH: &str = "MARKERS_CONFIG_PATH";

fn default_penalty() -> f64 {
    DEFAULT_MARKER_PENALTY
}

#[derive(Debug, Clone, Deserialize)]
struct MarkerRoot {
    markers: MarkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkerConfig {
    /// Multiplier applied to the base score when a body has no marker hit.
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    #[serde(default)]
    pub news: Vec<String>,
    #[serde(default)]
    pub regulation: Vec<String>,
}

/// Compiled marker matcher. An empty category list means "no policy for
/// that category", never "penalize everything".
#[derive(Debug, Clone)]
pub struct MarkerEngine {
    penalty: f64,
    news: Option<Regex>,
    regulation: Option<Regex>,
}

impl MarkerEngine {
    /// Engine that never adjusts any score.
    pub fn disabled() -> Self {
        Self {
            penalty: DEFAULT_MARKER_PENALTY,
            news: None,
            regulation: None,
        }
    }

    /// Load from a TOML file. Uses MARKERS_CONFIG_PATH or defaults to
    /// "config/markers.toml". A missing file is a disabled engine, not an
    /// error; a present-but-broken file is an error.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_MARKERS_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MARKERS_CONFIG_PATH));

        if !path.exists() {
            tracing::info!(target: "poll", path = %path.display(), "no markers config; content signals disabled");
            return Ok(Self::disabled());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read markers config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let root: MarkerRoot = toml::from_str(toml_str)?;
        let cfg = root.markers;
        Ok(Self {
            penalty: cfg.penalty.clamp(0.0, 1.0),
            news: compile_markers("news", &cfg.news)?,
            regulation: compile_markers("regulation", &cfg.regulation)?,
        })
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Whether `body` carries at least one marker for `category`.
    /// `None` when no markers are configured for that category.
    pub fn matches(&self, category: SourceCategory, body: &str) -> Option<bool> {
        let re = match category {
            SourceCategory::News => self.news.as_ref()?,
            SourceCategory::Regulation => self.regulation.as_ref()?,
        };
        Some(re.is_match(body))
    }
}

/// One alternation per category, whole-word and case-insensitive.
fn compile_markers(category: &str, terms: &[String]) -> anyhow::Result<Option<Regex>> {
    let terms: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(word_bounded)
        .collect();
    if terms.is_empty() {
        return Ok(None);
    }
    let pattern = format!(r"(?i)(?:{})", terms.join("|"));
    let re = Regex::new(&pattern)
        .map_err(|e| anyhow::anyhow!("marker list `{}` regex error: {}", category, e))?;
    Ok(Some(re))
}

/// Escape a term and anchor it with `\b` on the sides that end in a word
/// character. A `\b` next to punctuation can never match, so terms like
/// "(hemp)" get anchored only where it is meaningful.
fn word_bounded(term: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = term.chars().next().map(is_word).unwrap_or(false);
    let trail = term.chars().last().map(is_word).unwrap_or(false);
    format!(
        "{}{}{}",
        if lead { r"\b" } else { "" },
        regex::escape(term),
        if trail { r"\b" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [markers]
        penalty = 0.5
        news = ["cannabis", "hemp", "marijuana"]
        regulation = ["rule", "regulation", "license"]
    "#;

    #[test]
    fn matches_are_word_bounded_and_case_insensitive() {
        let eng = MarkerEngine::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            eng.matches(SourceCategory::News, "Medical Cannabis program update"),
            Some(true)
        );
        // "hemphill" must not count as "hemp"
        assert_eq!(
            eng.matches(SourceCategory::News, "Hemphill county fair"),
            Some(false)
        );
        assert_eq!(
            eng.matches(SourceCategory::Regulation, "LICENSE renewal portal"),
            Some(true)
        );
    }

    #[test]
    fn empty_category_has_no_policy() {
        let eng = MarkerEngine::from_toml_str(
            r#"
            [markers]
            news = ["cannabis"]
            "#,
        )
        .unwrap();
        assert_eq!(eng.matches(SourceCategory::Regulation, "anything"), None);
        assert_eq!(eng.penalty(), DEFAULT_MARKER_PENALTY);
    }

    #[test]
    fn disabled_engine_never_matches() {
        let eng = MarkerEngine::disabled();
        assert_eq!(eng.matches(SourceCategory::News, "cannabis"), None);
    }

    #[test]
    fn penalty_is_clamped() {
        let eng = MarkerEngine::from_toml_str(
            r#"
            [markers]
            penalty = 7.5
            news = ["cannabis"]
            "#,
        )
        .unwrap();
        assert_eq!(eng.penalty(), 1.0);
    }

    #[test]
    fn terms_with_regex_metachars_are_escaped() {
        let eng = MarkerEngine::from_toml_str(
            r#"
            [markers]
            news = ["delta-8 (hemp)"]
            "#,
        )
        .unwrap();
        assert_eq!(
            eng.matches(SourceCategory::News, "rules on delta-8 (hemp) products"),
            Some(true)
        );
        assert_eq!(eng.matches(SourceCategory::News, "delta-8 hemp"), Some(false));
    }
}

//! # Source Registry
//! Per-jurisdiction configuration of candidate URLs to monitor, keyed by
//! two-letter state code. Each entry holds two ordered lists, `newsPages`
//! and `regulationPages`; list order is significant and survives round-trips.
//!
//! The registry is read-only during a poll run. Writers go through
//! [`RegistryStore::save`], which is atomic (tmp file + rename) and exclusive
//! (lock file); a second concurrent writer gets [`RegistryError::WriteConflict`]
//! instead of a partial write.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::states;

/// Failure taxonomy for registry I/O. Per-source fetch failures are *not*
/// errors (they become `FetchResult` data); only structural failures land here.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backing file cannot be parsed into the expected shape, or the
    /// parsed shape violates a registry invariant. Fatal to a poll run:
    /// callers must not poll against a partially-parsed registry.
    #[error("registry corrupt: {0}")]
    Corrupt(String),

    /// Another writer holds the registry lock. The caller must abort without
    /// touching the file.
    #[error("registry write conflict: another curation is in progress")]
    WriteConflict,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which list a source lives in. A URL belongs to exactly one state and one
/// category at a time; replacement means remove + add, never edit in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    News,
    Regulation,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::News => "news",
            SourceCategory::Regulation => "regulation",
        }
    }
}

/// The two URL lists registered for one jurisdiction. Both keys are required
/// on disk; a missing category is a corrupt registry, not an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateSources {
    #[serde(rename = "newsPages")]
    pub news_pages: Vec<String>,
    #[serde(rename = "regulationPages")]
    pub regulation_pages: Vec<String>,
}

impl StateSources {
    pub fn is_empty(&self) -> bool {
        self.news_pages.is_empty() && self.regulation_pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.news_pages.len() + self.regulation_pages.len()
    }
}

/// Borrowed view of one registered source, used by the poller and the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRef<'a> {
    pub state: &'a str,
    pub category: SourceCategory,
    pub url: &'a str,
}

/// Per-state source counts, the shape served by the registry summary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    #[serde(rename = "newsCount")]
    pub news: usize,
    #[serde(rename = "regulationCount")]
    pub regulation: usize,
}

/// The whole configuration: state code → registered sources. `BTreeMap` keeps
/// state iteration deterministic, so reports and exports are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    pub states: BTreeMap<String, StateSources>,
}

impl Registry {
    /// Parse and validate a registry from its JSON form.
    pub fn parse(json: &str) -> Result<Self, RegistryError> {
        let reg: Registry = serde_json::from_str(json)
            .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
        reg.validate()?;
        Ok(reg)
    }

    /// Structural invariants beyond what serde enforces:
    /// - every key is a known jurisdiction code,
    /// - every URL is absolute HTTP(S),
    /// - no URL is registered twice anywhere in the registry.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for (code, sources) in &self.states {
            if !states::is_valid_code(code) {
                return Err(RegistryError::Corrupt(format!(
                    "unknown jurisdiction code `{code}`"
                )));
            }
            for url in sources.news_pages.iter().chain(&sources.regulation_pages) {
                if !url.starts_with("http") {
                    return Err(RegistryError::Corrupt(format!(
                        "{code}: source `{url}` is not an absolute http(s) URL"
                    )));
                }
                if !seen.insert(url.as_str()) {
                    return Err(RegistryError::Corrupt(format!(
                        "{code}: source `{url}` is registered more than once"
                    )));
                }
            }
        }
        Ok(())
    }

    /// All sources of one state in the jurisdiction's source order:
    /// `newsPages` first, then `regulationPages`. Empty for unknown codes.
    pub fn sources_of<'a>(&'a self, code: &'a str) -> Vec<SourceRef<'a>> {
        let Some(sources) = self.states.get(code) else {
            return Vec::new();
        };
        let news = sources.news_pages.iter().map(|u| SourceRef {
            state: code,
            category: SourceCategory::News,
            url: u,
        });
        let regulation = sources.regulation_pages.iter().map(|u| SourceRef {
            state: code,
            category: SourceCategory::Regulation,
            url: u,
        });
        news.chain(regulation).collect()
    }

    /// Every source in the registry, states in key order.
    pub fn all_sources(&self) -> Vec<SourceRef<'_>> {
        self.states
            .keys()
            .flat_map(|code| self.sources_of(code))
            .collect()
    }

    pub fn count_sources(&self, code: &str) -> Option<SourceCounts> {
        self.states.get(code).map(|s| SourceCounts {
            news: s.news_pages.len(),
            regulation: s.regulation_pages.len(),
        })
    }

    pub fn total_sources(&self) -> usize {
        self.states.values().map(StateSources::len).sum()
    }

    /// Short content fingerprint of the registry (12 hex chars of SHA-256 over
    /// the canonical JSON form). Reports carry this so an operator can tell
    /// whether a report still describes the current registry.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/* ----------------------------
File-backed store
---------------------------- */

/// File-backed registry persistence. `save` always rewrites the full set:
/// the configuration is replaced wholesale, never patched field-by-field.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Registry, RegistryError> {
        let content = fs::read_to_string(&self.path)?;
        Registry::parse(&content)
    }

    /// Take the exclusive write lock. A curation holds this across its whole
    /// load→save window so an interleaved writer fails with `WriteConflict`
    /// instead of silently reinstating sources the other one removed.
    pub fn lock(&self) -> Result<RegistryLock, RegistryError> {
        RegistryLock::acquire(&self.path)
    }

    /// Atomic, exclusive save: take the lock file, write a sibling tmp file,
    /// rename over the target, release the lock. A concurrent writer fails
    /// with `WriteConflict` before anything is written.
    pub fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        let lock = self.lock()?;
        self.save_locked(registry, &lock)
    }

    /// Save under a lock the caller already holds (and keeps holding; the
    /// guard must come from [`RegistryStore::lock`] on this same path).
    pub fn save_locked(
        &self,
        registry: &Registry,
        _lock: &RegistryLock,
    ) -> Result<(), RegistryError> {
        registry.validate()?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, registry.to_json_pretty())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Exclusive write lock, held for the duration of one save or one whole
/// curation. Implemented as a `create_new` sibling file; dropped (removed)
/// when the guard goes away.
pub struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    fn acquire(registry_path: &Path) -> Result<Self, RegistryError> {
        let path = registry_path.with_extension("json.lock");
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RegistryError::WriteConflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/* ----------------------------
Lint: curation candidates
---------------------------- */

/// A pair of registered URLs that look like accidental duplicates (trailing
/// slash, http/https twins, copy-paste typos). Surfaced to operators, never
/// acted on automatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintWarning {
    pub state: String,
    pub category: SourceCategory,
    pub a: String,
    pub b: String,
    pub similarity: f64,
}

const NEAR_DUPLICATE_SIMILARITY: f64 = 0.92;

/// Flag near-duplicate URLs within the same state and category.
pub fn lint_near_duplicates(registry: &Registry) -> Vec<LintWarning> {
    let mut out = Vec::new();
    for (code, sources) in &registry.states {
        for (category, list) in [
            (SourceCategory::News, &sources.news_pages),
            (SourceCategory::Regulation, &sources.regulation_pages),
        ] {
            for i in 0..list.len() {
                for j in (i + 1)..list.len() {
                    let sim = strsim::normalized_levenshtein(&list[i], &list[j]);
                    if sim >= NEAR_DUPLICATE_SIMILARITY {
                        out.push(LintWarning {
                            state: code.clone(),
                            category,
                            a: list[i].clone(),
                            b: list[j].clone(),
                            similarity: sim,
                        });
                    }
                }
            }
        }
    }
    out
}

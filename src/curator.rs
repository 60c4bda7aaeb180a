// src/curator.rs
//! Curation: empty the source lists of flagged states.
//!
//! `curate` is pure and returns the rewritten registry together with a diff;
//! nothing is persisted until [`Curator::apply`] runs. `apply` snapshots the
//! pre-curation registry first (there is no automatic undo), saves through
//! the exclusive store, then regenerates the derived export so it never
//! diverges from the registry.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::export;
use crate::registry::{Registry, RegistryError, RegistryStore};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("curator_runs_total", "Completed curation runs.");
        describe_counter!(
            "curator_sources_removed_total",
            "Sources removed from the registry by curation."
        );
    });
}

/// Everything one curation removed from one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub state: String,
    pub removed_news: Vec<String>,
    pub removed_regulation: Vec<String>,
}

impl StateChange {
    pub fn removed_count(&self) -> usize {
        self.removed_news.len() + self.removed_regulation.len()
    }
}

/// Record of one curation: what was removed, plus which requested codes had
/// no registry entry (those are no-ops, not errors).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationDiff {
    pub changes: Vec<StateChange>,
    pub unknown_codes: Vec<String>,
    pub sources_removed: usize,
}

impl CurationDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Replace the news and regulation lists of every state in `codes` with
/// empty lists. The input registry is untouched.
pub fn curate(registry: &Registry, codes: &BTreeSet<String>) -> (Registry, CurationDiff) {
    let mut new_registry = registry.clone();
    let mut diff = CurationDiff::default();

    for code in codes {
        match new_registry.states.get_mut(code) {
            Some(sources) => {
                let removed_news = std::mem::take(&mut sources.news_pages);
                let removed_regulation = std::mem::take(&mut sources.regulation_pages);
                if removed_news.is_empty() && removed_regulation.is_empty() {
                    continue;
                }
                diff.sources_removed += removed_news.len() + removed_regulation.len();
                diff.changes.push(StateChange {
                    state: code.clone(),
                    removed_news,
                    removed_regulation,
                });
            }
            None => diff.unknown_codes.push(code.clone()),
        }
    }

    (new_registry, diff)
}

/* ----------------------------
Applying a curation
---------------------------- */

pub struct Curator {
    store: RegistryStore,
    export_path: PathBuf,
}

impl Curator {
    pub fn new<P: Into<PathBuf>>(store: RegistryStore, export_path: P) -> Self {
        Self {
            store,
            export_path: export_path.into(),
        }
    }

    /// Where the pre-curation snapshot lands, next to the registry file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.store.path().with_extension("json.snapshot")
    }

    /// Snapshot, curate, save, regenerate the export, all under the
    /// registry's exclusive write lock. A held lock aborts the whole
    /// invocation with `WriteConflict` before anything — the registry file
    /// and the previous invocation's snapshot included — is touched, and
    /// holding it across the load→save window means two interleaved
    /// curations cannot silently undo each other's removals.
    pub fn apply(&self, codes: &BTreeSet<String>) -> Result<CurationDiff, RegistryError> {
        ensure_metrics_described();
        let lock = self.store.lock()?;
        let registry = self.store.load()?;

        let snapshot = self.snapshot_path();
        fs::write(&snapshot, registry.to_json_pretty())?;

        let (new_registry, diff) = curate(&registry, codes);
        self.store.save_locked(&new_registry, &lock)?;
        export::write_registry_csv(&new_registry, &self.export_path)?;
        drop(lock);

        counter!("curator_runs_total").increment(1);
        counter!("curator_sources_removed_total").increment(diff.sources_removed as u64);
        tracing::info!(
            target: "curator",
            states = diff.changes.len(),
            removed = diff.sources_removed,
            unknown = diff.unknown_codes.len(),
            snapshot = %snapshot.display(),
            "curation applied"
        );
        Ok(diff)
    }
}

// tests/pipeline_e2e.rs
//
// Full pipeline on disk: registry -> poll cycle -> report artifact ->
// curation -> rewritten registry + regenerated export. No network; the
// prober serves canned outcomes.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use regsource_monitor::curator::Curator;
use regsource_monitor::markers::MarkerEngine;
use regsource_monitor::poll::types::{PollOptions, ProbeOutcome, UrlProber};
use regsource_monitor::poll::{run_poll_cycle, PollContext};
use regsource_monitor::registry::RegistryStore;
use regsource_monitor::report;

struct CannedProber {
    outcomes: HashMap<String, ProbeOutcome>,
}

#[async_trait]
impl UrlProber for CannedProber {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
        self.outcomes.get(url).cloned().unwrap_or(ProbeOutcome {
            error: Some("timeout".to_string()),
            ..ProbeOutcome::default()
        })
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

fn ok200() -> ProbeOutcome {
    ProbeOutcome {
        status: Some(200),
        latency_ms: Some(42),
        ..ProbeOutcome::default()
    }
}

const REGISTRY: &str = r#"{
    "AR": {
        "newsPages": ["https://ar.gov/u1", "https://ar.gov/u2"],
        "regulationPages": []
    },
    "CO": {
        "newsPages": ["https://co.gov/a", "https://co.gov/b"],
        "regulationPages": ["https://co.gov/c"]
    }
}"#;

#[tokio::test]
async fn poll_then_curate_empties_the_flagged_state() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("sources.json");
    let report_path = dir.path().join("state/last_report.json");
    let export_path = dir.path().join("exports/sources.csv");
    fs::write(&registry_path, REGISTRY).unwrap();

    // AR: u1 -> 200, u2 -> timeout. CO: all three fine.
    let outcomes = HashMap::from([
        ("https://ar.gov/u1".to_string(), ok200()),
        ("https://co.gov/a".to_string(), ok200()),
        ("https://co.gov/b".to_string(), ok200()),
        ("https://co.gov/c".to_string(), ok200()),
    ]);

    let ctx = PollContext {
        store: RegistryStore::new(&registry_path),
        prober: Arc::new(CannedProber { outcomes }),
        markers: MarkerEngine::disabled(),
        options: PollOptions::default(),
        report_path: report_path.clone(),
    };

    let report = run_poll_cycle(&ctx).await.unwrap();

    // AR: scores [1.0, 0.0] -> average 0.5, 1 accessible -> problematic
    // (count trigger). CO: all accessible, average 1.0 -> clean.
    let ar = &report.metrics_by_state["AR"];
    assert_eq!(ar.total_sources, 2);
    assert_eq!(ar.accessible_sources, 1);
    assert!((ar.average_score - 0.5).abs() < 1e-9);
    assert_eq!(ar.sources[1].fetch.error.as_deref(), Some("timeout"));

    assert_eq!(
        report.problematic_states,
        BTreeSet::from(["AR".to_string()])
    );
    assert_eq!(report.total_sources_evaluated, 5);

    // The artifact landed on disk and reads back identically.
    let persisted = report::read_report(&report_path).expect("artifact exists");
    assert_eq!(persisted, report);

    // Curate the problematic set the report produced.
    let curator = Curator::new(RegistryStore::new(&registry_path), &export_path);
    let diff = curator.apply(&report.problematic_states).unwrap();
    assert_eq!(diff.sources_removed, 2);

    let after = RegistryStore::new(&registry_path).load().unwrap();
    assert!(after.states["AR"].is_empty());
    assert_eq!(after.states["CO"].len(), 3);

    // Export regenerated: CO rows only.
    let csv = fs::read_to_string(&export_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "state,url,category");
    assert_eq!(lines.len(), 4);
    assert!(lines[1..].iter().all(|l| l.starts_with("CO,")));
}

#[tokio::test]
async fn corrupt_registry_aborts_before_any_probe() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("sources.json");
    let report_path = dir.path().join("state/last_report.json");
    fs::write(&registry_path, r#"{"AR": {"newsPages": ["https://ar.gov"]}}"#).unwrap();

    let ctx = PollContext {
        store: RegistryStore::new(&registry_path),
        prober: Arc::new(CannedProber {
            outcomes: HashMap::new(),
        }),
        markers: MarkerEngine::disabled(),
        options: PollOptions::default(),
        report_path: report_path.clone(),
    };

    let err = run_poll_cycle(&ctx).await.unwrap_err();
    assert!(err.to_string().contains("corrupt"), "got: {err}");
    assert!(!report_path.exists());
}

#[tokio::test]
async fn next_cycle_supersedes_the_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("sources.json");
    let report_path = dir.path().join("state/last_report.json");
    fs::write(
        &registry_path,
        r#"{"NM": {"newsPages": ["https://nm.gov/a"], "regulationPages": []}}"#,
    )
    .unwrap();

    let run = |outcomes: HashMap<String, ProbeOutcome>| {
        let ctx = PollContext {
            store: RegistryStore::new(&registry_path),
            prober: Arc::new(CannedProber { outcomes }),
            markers: MarkerEngine::disabled(),
            options: PollOptions::default(),
            report_path: report_path.clone(),
        };
        async move { run_poll_cycle(&ctx).await.unwrap() }
    };

    let first = run(HashMap::new()).await;
    assert_eq!(first.metrics_by_state["NM"].accessible_sources, 0);

    let second = run(HashMap::from([("https://nm.gov/a".to_string(), ok200())])).await;
    assert_eq!(second.metrics_by_state["NM"].accessible_sources, 1);

    // Disk holds only the newest run.
    let persisted = report::read_report(&report_path).unwrap();
    assert_eq!(persisted.metrics_by_state["NM"].accessible_sources, 1);
}

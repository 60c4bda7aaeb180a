// tests/poll_ordering.rs
//
// Results must come back in registry source order no matter how the
// concurrent probes finish. Probes sleep a random few milliseconds so the
// completion order is scrambled on every run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use regsource_monitor::poll::types::{PollOptions, ProbeOutcome, UrlProber};
use regsource_monitor::poll::poll_registry;
use regsource_monitor::registry::Registry;

struct ScrambledProber {
    statuses: HashMap<String, u16>,
}

#[async_trait]
impl UrlProber for ScrambledProber {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
        let delay = rand::rng().random_range(1..25);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        match self.statuses.get(url) {
            Some(&status) => ProbeOutcome {
                status: Some(status),
                latency_ms: Some(delay),
                ..ProbeOutcome::default()
            },
            None => ProbeOutcome {
                error: Some("connect failed".to_string()),
                ..ProbeOutcome::default()
            },
        }
    }

    fn name(&self) -> &'static str {
        "scrambled"
    }
}

fn registry_with_five_sources() -> Registry {
    Registry::parse(
        r#"{
            "AR": {
                "newsPages": [
                    "https://ar.gov/one",
                    "https://ar.gov/two",
                    "https://ar.gov/three"
                ],
                "regulationPages": [
                    "https://ar.gov/four",
                    "https://ar.gov/five"
                ]
            }
        }"#,
    )
    .expect("registry parses")
}

#[tokio::test]
async fn five_concurrent_probes_come_back_in_source_order() {
    let registry = registry_with_five_sources();
    let expected: Vec<String> = registry
        .sources_of("AR")
        .iter()
        .map(|s| s.url.to_string())
        .collect();

    let statuses: HashMap<String, u16> = expected
        .iter()
        .map(|url| (url.clone(), 200u16))
        .collect();

    // Several rounds, since a single lucky ordering proves nothing.
    for _ in 0..10 {
        let prober = Arc::new(ScrambledProber {
            statuses: statuses.clone(),
        });
        let by_state = poll_registry(&registry, prober, &PollOptions::default()).await;
        let got: Vec<String> = by_state["AR"].iter().map(|r| r.url.clone()).collect();
        assert_eq!(got, expected);
    }
}

#[tokio::test]
async fn ordering_holds_with_a_tiny_worker_limit() {
    let registry = registry_with_five_sources();
    let expected: Vec<String> = registry
        .sources_of("AR")
        .iter()
        .map(|s| s.url.to_string())
        .collect();

    let prober = Arc::new(ScrambledProber {
        statuses: expected.iter().map(|u| (u.clone(), 301u16)).collect(),
    });
    let options = PollOptions::default().with_concurrency(2);

    let by_state = poll_registry(&registry, prober, &options).await;
    let got: Vec<String> = by_state["AR"].iter().map(|r| r.url.clone()).collect();
    assert_eq!(got, expected);
    assert!(by_state["AR"].iter().all(|r| r.reachable));
}

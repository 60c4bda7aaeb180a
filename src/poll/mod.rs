// src/poll/mod.rs
//! The poller: probe every registered source, score the outcomes, and build
//! the run report.
//!
//! One `run_poll_cycle` is the single entry point any trigger (the interval
//! scheduler, the `/admin/poll` route, the `poll_once` binary) calls. Probes
//! run concurrently under a worker limit and a global run deadline; results
//! are reassembled into registry source order before scoring so reports are
//! reproducible regardless of completion order.

pub mod http;
pub mod scheduler;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::markers::MarkerEngine;
use crate::registry::{Registry, RegistryStore, SourceCategory};
use crate::report::{self, Report};
use crate::scoring;

pub use types::{FetchResult, PollOptions, ProbeOutcome, UrlProber};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_runs_total", "Completed poll cycles.");
        describe_counter!("poll_sources_total", "Sources probed across all cycles.");
        describe_counter!(
            "poll_fetch_failures_total",
            "Probes that came back unreachable."
        );
        describe_histogram!("poll_fetch_latency_ms", "Per-probe latency in milliseconds.");
        describe_gauge!("poll_last_run_ts", "Unix timestamp of the last completed cycle.");
        describe_gauge!(
            "report_problematic_states",
            "States flagged problematic by the last cycle."
        );
    });
}

/// An owned source to probe: `(state, category, url)` in registry order.
type SourceJob = (String, SourceCategory, String);

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Probe every source in the registry. Concurrency is bounded by
/// `options.concurrency`; any probe not started before `options.deadline`
/// is recorded as a timeout failure rather than skipped, so every source
/// has a result. Output preserves registry order per state.
pub async fn poll_registry(
    registry: &Registry,
    prober: Arc<dyn UrlProber>,
    options: &PollOptions,
) -> BTreeMap<String, Vec<FetchResult>> {
    let jobs: Vec<SourceJob> = registry
        .all_sources()
        .into_iter()
        .map(|s| (s.state.to_string(), s.category, s.url.to_string()))
        .collect();

    let deadline = Instant::now() + options.deadline;
    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let mut set: JoinSet<(usize, ProbeOutcome)> = JoinSet::new();

    for (idx, (_, _, url)) in jobs.iter().enumerate() {
        let prober = Arc::clone(&prober);
        let semaphore = Arc::clone(&semaphore);
        let url = url.clone();
        let timeout = options.timeout;
        set.spawn(async move {
            // A closed semaphore cannot happen here; treat it like the
            // deadline to keep the arm total anyway.
            let Ok(_permit) = semaphore.acquire().await else {
                return (idx, ProbeOutcome::deadline_exceeded());
            };
            let now = Instant::now();
            if now >= deadline {
                return (idx, ProbeOutcome::deadline_exceeded());
            }
            // Never let a single probe overshoot the run budget.
            let budget = timeout.min(deadline - now);
            (idx, prober.probe(&url, budget).await)
        });
    }

    let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; jobs.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
            Err(e) => tracing::warn!(target: "poll", error = %e, "probe task panicked"),
        }
    }

    let observed_at = now_unix();
    let mut by_state: BTreeMap<String, Vec<FetchResult>> = registry
        .states
        .keys()
        .map(|code| (code.clone(), Vec::new()))
        .collect();

    // Results land back in job order, which is registry source order.
    for ((state, category, url), outcome) in jobs.into_iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(ProbeOutcome::deadline_exceeded);
        let reachable = matches!(outcome.status, Some(s) if (200..=399).contains(&s));
        if let Some(ms) = outcome.latency_ms {
            histogram!("poll_fetch_latency_ms").record(ms as f64);
        }
        if !reachable {
            counter!("poll_fetch_failures_total").increment(1);
        }
        let result = FetchResult {
            state: state.clone(),
            category,
            url,
            http_status: outcome.status,
            reachable,
            latency_ms: outcome.latency_ms,
            error: outcome.error,
            observed_at,
            last_modified_unix: outcome.last_modified_unix,
            body_excerpt: outcome.body_excerpt,
        };
        by_state.entry(state).or_default().push(result);
    }
    by_state
}

/// Everything one poll cycle needs. Built once at startup and shared by the
/// scheduler, the admin route, and the `poll_once` binary.
pub struct PollContext {
    pub store: RegistryStore,
    pub prober: Arc<dyn UrlProber>,
    pub markers: MarkerEngine,
    pub options: PollOptions,
    /// Where the report artifact is persisted after the cycle.
    pub report_path: PathBuf,
}

/// Run one full cycle: load registry, probe, score, aggregate, build the
/// report, persist it. A corrupt registry aborts before any probe runs;
/// individual probe failures are report rows, never errors.
pub async fn run_poll_cycle(ctx: &PollContext) -> anyhow::Result<Report> {
    ensure_metrics_described();
    let started = Instant::now();

    let registry = ctx.store.load()?;
    let fingerprint = registry.fingerprint();
    tracing::info!(
        target: "poll",
        states = registry.states.len(),
        sources = registry.total_sources(),
        fingerprint = %fingerprint,
        prober = ctx.prober.name(),
        "poll cycle started"
    );

    let by_state = poll_registry(&registry, Arc::clone(&ctx.prober), &ctx.options).await;

    let metrics_by_state: BTreeMap<String, scoring::StateMetrics> = by_state
        .into_iter()
        .map(|(code, fetches)| {
            let scored = fetches
                .into_iter()
                .map(|f| scoring::score(f, &ctx.markers))
                .collect();
            (code, scoring::aggregate(scored))
        })
        .collect();

    let report = report::build(&ctx.options.pipeline, &fingerprint, now_unix(), metrics_by_state);
    report::write_report(&report, &ctx.report_path)?;

    counter!("poll_runs_total").increment(1);
    counter!("poll_sources_total").increment(report.total_sources_evaluated as u64);
    gauge!("poll_last_run_ts").set(report.generated_at as f64);
    gauge!("report_problematic_states").set(report.problematic_states.len() as f64);

    tracing::info!(
        target: "poll",
        sources = report.total_sources_evaluated,
        problematic = report.problematic_states.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "poll cycle finished"
    );
    Ok(report)
}

//! Regulatory Source Monitor — Binary Entrypoint
//! Boots the Axum HTTP server and the background poll scheduler.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use regsource_monitor::api::{self, AppState};
use regsource_monitor::config::MonitorConfig;
use regsource_monitor::history::History;
use regsource_monitor::markers::MarkerEngine;
use regsource_monitor::metrics::Metrics;
use regsource_monitor::poll::http::HttpProber;
use regsource_monitor::poll::scheduler::spawn_poll_scheduler;
use regsource_monitor::poll::PollContext;
use regsource_monitor::registry::RegistryStore;
use regsource_monitor::report::ReportHandle;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - MONITOR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("MONITOR_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("poll=info,curator=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let config = MonitorConfig::load().expect("Failed to load monitor config");
    let markers = MarkerEngine::from_toml().expect("Failed to load markers config");
    let prober = HttpProber::new(
        Duration::from_secs(config.timeout_secs),
        &config.user_agent,
    )
    .expect("Failed to build http prober");

    let ctx = Arc::new(PollContext {
        store: RegistryStore::new(&config.registry_path),
        prober: Arc::new(prober),
        markers,
        options: config.poll_options(),
        report_path: config.report_path.clone(),
    });

    let metrics = Metrics::init(config.interval_secs);
    let report = ReportHandle::default();
    let history = Arc::new(History::with_capacity(2000));
    let notifier = config.notifier();

    spawn_poll_scheduler(
        Arc::clone(&ctx),
        config.interval(),
        report.clone(),
        Arc::clone(&history),
        notifier,
    );

    let state = AppState {
        ctx,
        report,
        history,
        export_path: config.export_path.clone(),
    };
    let router = api::create_router(state).merge(metrics.router());

    Ok(router.into())
}

//! Run a single poll cycle from the command line and print the summary.
//! Same entry point the scheduler uses; the report artifact lands in the
//! same place, so the service picks it up on the next restart.

use std::sync::Arc;
use std::time::Duration;

use regsource_monitor::config::MonitorConfig;
use regsource_monitor::markers::MarkerEngine;
use regsource_monitor::poll::http::HttpProber;
use regsource_monitor::poll::{run_poll_cycle, PollContext};
use regsource_monitor::registry::RegistryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let config = MonitorConfig::load()?;
    let markers = MarkerEngine::from_toml()?;
    let prober = HttpProber::new(
        Duration::from_secs(config.timeout_secs),
        &config.user_agent,
    )?;

    let ctx = PollContext {
        store: RegistryStore::new(&config.registry_path),
        prober: Arc::new(prober),
        markers,
        options: config.poll_options(),
        report_path: config.report_path.clone(),
    };

    let report = run_poll_cycle(&ctx).await?;
    let summary = report.summary();

    println!(
        "polled {} sources across {} states ({} accessible)",
        summary.total_sources_evaluated, summary.states_evaluated, summary.accessible_sources
    );
    if summary.problematic_states.is_empty() {
        println!("no problematic states");
    } else {
        println!("problematic: {}", summary.problematic_states.join(", "));
    }
    println!("report written to {}", config.report_path.display());
    Ok(())
}

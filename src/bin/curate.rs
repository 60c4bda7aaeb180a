//! Apply a curation from the command line.
//!
//! With no arguments, curates the problematic states from the latest report
//! artifact. With arguments, curates exactly the listed state codes instead:
//!
//!   curate            # use state/last_report.json
//!   curate AR NM      # explicit override list
//!
//! A pre-curation snapshot is always written next to the registry file.

use std::collections::BTreeSet;

use regsource_monitor::config::MonitorConfig;
use regsource_monitor::curator::Curator;
use regsource_monitor::registry::RegistryStore;
use regsource_monitor::report;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let config = MonitorConfig::load()?;

    let override_codes: BTreeSet<String> = std::env::args().skip(1).collect();
    let codes = if override_codes.is_empty() {
        let report = report::read_report(&config.report_path).ok_or_else(|| {
            anyhow::anyhow!(
                "no report at {}; run poll_once first or pass state codes explicitly",
                config.report_path.display()
            )
        })?;
        report.problematic_states
    } else {
        override_codes
    };

    if codes.is_empty() {
        println!("nothing to curate");
        return Ok(());
    }

    let curator = Curator::new(RegistryStore::new(&config.registry_path), &config.export_path);
    let diff = curator.apply(&codes)?;

    for change in &diff.changes {
        println!("{}: removed {} sources", change.state, change.removed_count());
    }
    for code in &diff.unknown_codes {
        println!("{code}: not in registry, skipped");
    }
    println!(
        "done: {} sources removed; snapshot at {}",
        diff.sources_removed,
        curator.snapshot_path().display()
    );
    Ok(())
}

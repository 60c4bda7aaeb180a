// src/poll/scheduler.rs
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::history::History;
use crate::notify::{self, WebhookNotifier};
use crate::report::{self, ReportHandle};

use super::{run_poll_cycle, PollContext};

/// Spawn the background poll loop: one cycle per tick, latest report pushed
/// into the shared handle and the run history, and a webhook alert whenever
/// the problematic-state set differs from the previous run's.
///
/// The previous set is seeded from the persisted report artifact so a restart
/// does not re-alert on an unchanged set.
pub fn spawn_poll_scheduler(
    ctx: Arc<PollContext>,
    interval: Duration,
    handle: ReportHandle,
    history: Arc<History>,
    notifier: Option<WebhookNotifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut previous: BTreeSet<String> = report::read_report(&ctx.report_path)
            .map(|r| r.problematic_states)
            .unwrap_or_default();

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let report = match run_poll_cycle(&ctx).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "poll", error = %format!("{e:#}"), "poll tick failed");
                    continue;
                }
            };

            if let Some(alert) =
                notify::detect_change(&report.pipeline, &previous, &report.problematic_states)
            {
                match &notifier {
                    Some(n) => {
                        if let Err(e) = n.send_alert(&alert).await {
                            tracing::warn!(target: "poll", error = %format!("{e:#}"), "alert delivery failed");
                        }
                    }
                    None => tracing::debug!(target: "poll", "problematic set changed; no webhook configured"),
                }
            }

            previous = report.problematic_states.clone();
            history.push(&report);
            handle.set(report);
        }
    })
}

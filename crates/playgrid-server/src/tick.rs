//! The embedded tick driver.

use chrono::Utc;
use playgrid_scheduler::{Scheduler, TickOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Drives the matchmaker on a fixed interval until the process exits.
///
/// A skipped tick (another in flight) or a failed tick is logged and the
/// loop keeps going; the next interval retries.
pub async fn run_tick_loop(scheduler: Arc<Scheduler>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    info!(interval_secs = interval.as_secs(), "embedded tick driver started");

    loop {
        ticker.tick().await;
        match scheduler.tick_at(Utc::now()) {
            TickOutcome::Completed(report) => {
                if report.changed {
                    info!(
                        promoted = report.promoted,
                        timed_out = report.timed_out,
                        queue_depth = report.queue_depth,
                        online_hosts = report.online_hosts,
                        "matchmaker tick changed state"
                    );
                } else {
                    debug!(queue_depth = report.queue_depth, "matchmaker tick idle");
                }
            }
            TickOutcome::Skipped => {
                debug!("matchmaker tick skipped, another in flight");
            }
        }
    }
}

//! Periodic diagnostics reporter task.

use crate::data_plane::NotificationQueue;
use crate::diagnostics::{DiagnosticLog, PipelineCounters};
use crate::observability::events;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

const COMPONENT: &str = "diagnostics_reporter";

/// Spawns the reporter loop. Only called with a positive interval; a
/// non-positive configured interval disables reporting entirely.
pub(crate) fn spawn_reporter(
    counters: Arc<PipelineCounters>,
    queue: Arc<NotificationQueue>,
    diagnostic_log: Arc<DiagnosticLog>,
    interval: Duration,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the immediate first tick would report before anything happened
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let info = counters.snapshot(queue.capacity() as u64, queue.len() as u64);
            for line in info.render_report() {
                info!(component = COMPONENT, "{line}");
                diagnostic_log.write(line);
            }
        }

        info!(
            event = events::REPORTER_STOPPED,
            component = COMPONENT,
            "diagnostics reporter stopped"
        );
    })
}

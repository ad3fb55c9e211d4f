use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::PurgeService;
use crate::{config::WorkerConfig, pipeline::PurgeError};

/// Starts the purge worker loop.
///
/// Polls the queue one message at a time until `shutdown` fires. The loop
/// sleeps for the idle interval when the queue is empty or a poll failed.
pub async fn start_purge_worker(
    service: Arc<PurgeService>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) {
    tracing::info!(
        queue = service.queue().backend_name(),
        store = service.orchestrator().store().backend_name(),
        idle_interval_ms = config.idle_interval_ms,
        acknowledge = config.acknowledge,
        "Starting purge worker"
    );

    let interval = config.idle_interval();

    loop {
        let idle = match service.handle_next(&shutdown).await {
            Ok(Some(report)) => {
                tracing::debug!(
                    account_id = %report.account_id,
                    records = report.records_deleted(),
                    "Delete request handled"
                );
                false
            }
            Ok(None) => true,
            Err(PurgeError::Cancelled) if shutdown.is_cancelled() => break,
            Err(e) => {
                tracing::error!(error = %e, "Error handling delete request");
                true
            }
        };

        if shutdown.is_cancelled() {
            break;
        }

        if idle {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    tracing::info!("Purge worker stopped");
}

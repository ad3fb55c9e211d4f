//! Queue-driven account deletion service.
//!
//! Each delete request received from the queue runs one pipeline pass for its
//! account. A message is acknowledged only after the pass succeeded; failed
//! passes leave it on the queue so it is delivered again once its visibility
//! timeout expires.

mod worker;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use worker::start_purge_worker;

use crate::{
    config::WorkerConfig,
    observability::metrics,
    pipeline::{DeletionReport, Orchestrator, PurgeError, PurgeResult},
    queue::DeleteQueue,
};

pub struct PurgeService {
    queue: Arc<dyn DeleteQueue>,
    orchestrator: Orchestrator,
    acknowledge: bool,
}

impl PurgeService {
    pub fn new(
        queue: Arc<dyn DeleteQueue>,
        orchestrator: Orchestrator,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            acknowledge: config.acknowledge,
        }
    }

    pub fn queue(&self) -> &Arc<dyn DeleteQueue> {
        &self.queue
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Receive one delete request and process it.
    ///
    /// Returns `Ok(None)` when the queue had nothing to deliver.
    pub async fn handle_next(
        &self,
        cancel: &CancellationToken,
    ) -> PurgeResult<Option<DeletionReport>> {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PurgeError::Cancelled),
            received = self.queue.receive() => received,
        };

        let message = match received {
            Ok(Some(message)) => {
                metrics::record_queue_message("received");
                message
            }
            Ok(None) => {
                metrics::record_queue_message("empty");
                return Ok(None);
            }
            Err(e) => {
                metrics::record_queue_message("error");
                return Err(e.into());
            }
        };

        tracing::debug!(account_id = %message.account_id, "Received delete request");

        let report = match self.orchestrator.process(cancel, &message.account_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(
                    account_id = %message.account_id,
                    error = %e,
                    "Delete request failed, leaving message for redelivery"
                );
                return Err(e);
            }
        };

        if self.acknowledge
            && let Some(receipt_handle) = &message.receipt_handle
        {
            if let Err(e) = self.queue.acknowledge(receipt_handle).await {
                metrics::record_queue_message("error");
                return Err(e.into());
            }
            metrics::record_queue_message("acknowledged");
        }

        Ok(Some(report))
    }
}

//! Batch deletion worker.

use std::{sync::Arc, time::Instant};

use async_channel::Receiver;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{BatchFailure, DeleteBatch, WorkerExit, WorkerReport};
use crate::{
    observability::metrics,
    store::{ContentStore, KeySchema, TableKey},
};

pub(crate) struct DeletionWorker {
    pub id: usize,
    pub store: Arc<dyn ContentStore>,
    pub schema: KeySchema,
}

impl DeletionWorker {
    /// Delete batches from `work` until the quit signal arrives or `cancel` fires.
    ///
    /// A batch already waiting on the channel is taken before the quit signal,
    /// so a worker never quits while work it could pick up is pending. A
    /// dropped quit sender means the producer gave up; the worker then keeps
    /// draining until cancellation.
    pub async fn run(
        self,
        work: Receiver<DeleteBatch>,
        mut quit: oneshot::Receiver<()>,
        cancel: CancellationToken,
    ) -> WorkerReport {
        let mut report = WorkerReport::new(self.id);
        let mut work_open = true;
        let mut quit_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.exit = WorkerExit::Cancelled;
                    break;
                }
                batch = work.recv(), if work_open => match batch {
                    Ok(batch) => self.delete(batch, &mut report).await,
                    // Closed and drained
                    Err(_) => work_open = false,
                },
                signal = &mut quit, if quit_open => match signal {
                    Ok(()) => {
                        report.exit = WorkerExit::Quit;
                        break;
                    }
                    Err(_) => quit_open = false,
                },
            }
        }

        tracing::debug!(
            worker = self.id,
            exit = ?report.exit,
            batches = report.batches_deleted,
            records = report.records_deleted,
            failed = report.failures.len(),
            "Deletion worker stopped"
        );
        report
    }

    async fn delete(&self, batch: DeleteBatch, report: &mut WorkerReport) {
        let keys: Vec<TableKey> = batch
            .content_ids
            .iter()
            .map(|content_id| self.schema.table_key(&batch.account_id, content_id))
            .collect();
        let count = keys.len();

        let start = Instant::now();
        let result = self.store.batch_delete(&keys).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                metrics::record_batch_delete("success", count as u64, elapsed);
                report.batches_deleted += 1;
                report.records_deleted += count as u64;
                tracing::trace!(worker = self.id, records = count, "Batch deleted");
            }
            Err(e) => {
                if e.is_validation() {
                    metrics::record_batch_delete("validation_error", count as u64, elapsed);
                    tracing::error!(
                        worker = self.id,
                        records = count,
                        error = %e,
                        "Batch rejected by store validation"
                    );
                } else {
                    metrics::record_batch_delete("error", count as u64, elapsed);
                    tracing::error!(
                        worker = self.id,
                        records = count,
                        error = %e,
                        "Batch delete failed, skipping"
                    );
                }
                report.failures.push(BatchFailure {
                    worker: self.id,
                    batch_size: count,
                    error: e.to_string(),
                });
            }
        }
    }
}

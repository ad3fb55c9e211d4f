//! Fetch-and-dispatch producer.
//!
//! Pages through one account's content records and publishes them as
//! [`DeleteBatch`] values on the work channel. Once the scan is exhausted it
//! sends every consumer its quit signal. On a fetch failure it returns the
//! error without sending any quit signal.

use std::{num::NonZeroUsize, sync::Arc};

use async_channel::Sender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{DeleteBatch, ProducerStats, PurgeError, PurgeResult, split_batches};
use crate::{
    config::DispatchPolicy,
    observability::metrics,
    store::{ContentStore, ContinuationToken, KeySchema, MAX_BATCH_SIZE},
};

const BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(MAX_BATCH_SIZE) {
    Some(size) => size,
    None => panic!("MAX_BATCH_SIZE must be non-zero"),
};

pub(crate) struct Producer {
    pub store: Arc<dyn ContentStore>,
    pub schema: KeySchema,
    pub page_size: u32,
    pub policy: DispatchPolicy,
}

impl Producer {
    /// Scan and publish. The stats cover whatever was fetched and dispatched
    /// before an error, too.
    pub async fn run(
        self,
        account_id: String,
        work: Sender<DeleteBatch>,
        quits: Vec<oneshot::Sender<()>>,
        cancel: CancellationToken,
    ) -> (ProducerStats, PurgeResult<()>) {
        let mut stats = ProducerStats::default();
        if let Err(e) = self.scan(&account_id, &work, &cancel, &mut stats).await {
            return (stats, Err(e));
        }

        for quit in quits {
            // A consumer that already stopped has dropped its receiver.
            let _ = quit.send(());
        }

        tracing::debug!(
            pages = stats.pages_fetched,
            records = stats.records_found,
            batches = stats.batches_dispatched,
            "Scan complete, quit signals sent"
        );
        (stats, Ok(()))
    }

    async fn scan(
        &self,
        account_id: &str,
        work: &Sender<DeleteBatch>,
        cancel: &CancellationToken,
        stats: &mut ProducerStats,
    ) -> PurgeResult<()> {
        let query = self.schema.content_query(account_id, self.page_size);
        let mut pending: Vec<String> = Vec::new();
        let mut continuation: Option<ContinuationToken> = None;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PurgeError::Cancelled),
                page = self.store.query(&query, continuation.as_ref()) => page,
            };
            let page = fetched.map_err(|e| {
                tracing::error!(
                    error = %e,
                    page = stats.pages_fetched + 1,
                    "Failed to fetch page"
                );
                PurgeError::Fetch(e)
            })?;

            stats.pages_fetched += 1;
            match page.records {
                Ok(records) => {
                    metrics::record_page_fetched(self.store.backend_name(), true);
                    stats.records_found += records.len() as u64;
                    pending.extend(records.into_iter().map(|r| r.content_id));
                }
                Err(e) => {
                    metrics::record_page_fetched(self.store.backend_name(), false);
                    stats.pages_dropped += 1;
                    tracing::warn!(
                        error = %e,
                        page = stats.pages_fetched,
                        "Dropping undecodable page"
                    );
                }
            }

            if self.policy == DispatchPolicy::PerPage {
                // Publish only full batches; the short tail waits for the next page.
                let full = pending.len() - pending.len() % MAX_BATCH_SIZE;
                if full > 0 {
                    let ready: Vec<String> = pending.drain(..full).collect();
                    self.dispatch(account_id, ready, work, cancel, stats).await?;
                }
            }

            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        self.dispatch(account_id, pending, work, cancel, stats).await
    }

    async fn dispatch(
        &self,
        account_id: &str,
        content_ids: Vec<String>,
        work: &Sender<DeleteBatch>,
        cancel: &CancellationToken,
        stats: &mut ProducerStats,
    ) -> PurgeResult<()> {
        for chunk in split_batches(content_ids, BATCH_SIZE) {
            let batch = DeleteBatch {
                account_id: account_id.to_string(),
                content_ids: chunk,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PurgeError::Cancelled),
                sent = work.send(batch) => {
                    sent.map_err(|_| PurgeError::WorkersGone)?;
                }
            }
            stats.batches_dispatched += 1;
        }
        Ok(())
    }
}

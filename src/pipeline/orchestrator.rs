//! Account deletion orchestrator.
//!
//! Wires one producer and a pool of deletion workers together for a single
//! account:
//!
//! ```text
//!   store.query ─► Producer ─► [bounded channel] ─► DeletionWorker × N
//!                     │                                  ▲       │
//!                     └──── quit signal (one each) ──────┘       ▼
//!                                                        store.batch_delete
//! ```
//!
//! Workers stop on their own quit signal, never on channel closure. When the
//! producer fails, no quit signal is sent and the workers are stopped through
//! a child cancellation token instead. Every spawned task is joined before
//! [`Orchestrator::process`] returns.

use std::{sync::Arc, time::Instant};

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

use super::{
    DeletionReport, ProducerStats, PurgeError, PurgeResult, WorkerExit, consumer::DeletionWorker,
    producer::Producer,
};
use crate::{
    config::{PipelineConfig, PurgeConfig},
    observability::metrics,
    store::{ContentStore, KeySchema},
};

/// Lifecycle of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeState {
    Idle,
    /// Producer scanning, workers deleting.
    Running,
    /// Scan finished and quit signals sent; waiting on the workers.
    Draining,
    Done,
    Failed,
}

pub struct Orchestrator {
    store: Arc<dyn ContentStore>,
    schema: KeySchema,
    page_size: u32,
    pipeline: PipelineConfig,
    state: watch::Sender<PurgeState>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ContentStore>, config: &PurgeConfig) -> Self {
        Self::with_settings(
            store,
            config.store.key_schema(),
            config.store.page_size,
            config.pipeline.clone(),
        )
    }

    pub fn with_settings(
        store: Arc<dyn ContentStore>,
        schema: KeySchema,
        page_size: u32,
        pipeline: PipelineConfig,
    ) -> Self {
        let (state, _) = watch::channel(PurgeState::Idle);
        Self {
            store,
            schema,
            page_size,
            pipeline,
            state,
        }
    }

    /// Watch state transitions of subsequent runs.
    pub fn subscribe(&self) -> watch::Receiver<PurgeState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PurgeState {
        *self.state.borrow()
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Delete every content record of `account_id`.
    ///
    /// Succeeds once the scan completed and every worker received its quit
    /// signal, even if individual batch deletes failed; those are listed in
    /// the returned report. A page fetch failure is returned as
    /// [`PurgeError::Fetch`] and cancellation as [`PurgeError::Cancelled`].
    pub async fn process(
        &self,
        cancel: &CancellationToken,
        account_id: &str,
    ) -> PurgeResult<DeletionReport> {
        let (report, result) = self.process_with_report(cancel, account_id).await;
        result.map(|()| report)
    }

    /// Like [`process`](Self::process) but always returns the report. On the
    /// error path it still holds the producer's progress up to the failure
    /// and how each worker stopped.
    pub async fn process_with_report(
        &self,
        cancel: &CancellationToken,
        account_id: &str,
    ) -> (DeletionReport, PurgeResult<()>) {
        let span = info_span!("purge", account_id = %account_id);
        self.run(cancel, account_id).instrument(span).await
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        account_id: &str,
    ) -> (DeletionReport, PurgeResult<()>) {
        let start = Instant::now();
        let consumers = self.pipeline.consumers.max(1);

        tracing::info!(
            consumers,
            page_size = self.page_size,
            dispatch = ?self.pipeline.dispatch,
            backend = self.store.backend_name(),
            "Starting account deletion"
        );
        self.state.send_replace(PurgeState::Running);

        let run_cancel = cancel.child_token();
        let (work_tx, work_rx) = async_channel::bounded(self.pipeline.channel_capacity.max(1));

        let mut quits = Vec::with_capacity(consumers);
        let mut workers = Vec::with_capacity(consumers);
        for id in 0..consumers {
            let (quit_tx, quit_rx) = oneshot::channel();
            quits.push(quit_tx);

            let worker = DeletionWorker {
                id,
                store: self.store.clone(),
                schema: self.schema.clone(),
            };
            workers.push(tokio::spawn(
                worker
                    .run(work_rx.clone(), quit_rx, run_cancel.clone())
                    .in_current_span(),
            ));
        }
        drop(work_rx);

        let producer = Producer {
            store: self.store.clone(),
            schema: self.schema.clone(),
            page_size: self.page_size,
            policy: self.pipeline.dispatch,
        };
        let producer_task = tokio::spawn(
            producer
                .run(account_id.to_string(), work_tx, quits, run_cancel.clone())
                .in_current_span(),
        );

        let (stats, scanned) = match producer_task.await {
            Ok(outcome) => outcome,
            Err(e) => (ProducerStats::default(), Err(PurgeError::Join(e.to_string()))),
        };
        match &scanned {
            Ok(()) => {
                self.state.send_replace(PurgeState::Draining);
            }
            Err(e) => {
                tracing::error!(error = %e, "Scan failed, stopping deletion workers");
                run_cancel.cancel();
            }
        }

        let mut report = DeletionReport::new(account_id);
        report.producer = stats;
        let mut join_error = None;
        for task in workers {
            match task.await {
                Ok(worker) => report.workers.push(worker),
                Err(e) => {
                    tracing::error!(error = %e, "Deletion worker task failed");
                    join_error.get_or_insert(PurgeError::Join(e.to_string()));
                }
            }
        }
        report.duration = start.elapsed();

        let result = match (scanned, join_error) {
            // The workers' own failure is why the producer lost its receivers
            (Err(PurgeError::WorkersGone), Some(e)) => Err(e),
            (Err(e), _) => Err(e),
            (Ok(()), Some(e)) => Err(e),
            // Cancelled while draining
            (Ok(()), None) if !report.all_workers_exited(WorkerExit::Quit) => {
                Err(PurgeError::Cancelled)
            }
            (Ok(()), None) => Ok(()),
        };

        self.finish(&report, &result);
        (report, result)
    }

    fn finish(&self, report: &DeletionReport, result: &PurgeResult<()>) {
        let duration_ms = report.duration.as_millis() as u64;
        let outcome = match result {
            Ok(()) if report.is_complete() => "complete",
            Ok(()) => "partial",
            Err(PurgeError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        metrics::record_purge_run(outcome, report.duration.as_secs_f64());

        match result {
            Ok(()) => {
                self.state.send_replace(PurgeState::Done);
                if outcome == "complete" {
                    tracing::info!(
                        records = report.records_deleted(),
                        batches = report.batches_deleted(),
                        pages = report.producer.pages_fetched,
                        duration_ms,
                        "Account deletion complete"
                    );
                } else {
                    tracing::warn!(
                        records = report.records_deleted(),
                        batches = report.batches_deleted(),
                        batches_failed = report.batches_failed(),
                        pages_dropped = report.producer.pages_dropped,
                        duration_ms,
                        "Account deletion finished with skipped records"
                    );
                }
            }
            Err(e) => {
                self.state.send_replace(PurgeState::Failed);
                tracing::error!(
                    error = %e,
                    records = report.records_deleted(),
                    duration_ms,
                    "Account deletion failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::{
        config::DispatchPolicy,
        seed::seed_account,
        store::{
            ContentItem, ContentQuery, ContinuationToken, MemoryContentStore, QueryPage,
            StoreError, StoreResult, TableKey,
        },
    };

    /// Counts calls and injects failures in front of an in-memory store.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryContentStore,
        queries: AtomicUsize,
        deletes: AtomicUsize,
        /// Zero-based query index that fails with a transport error.
        fail_query: Option<usize>,
        /// Zero-based batch delete index that fails validation.
        reject_delete: Option<usize>,
        /// Time each batch delete takes.
        delete_delay: Option<Duration>,
        panic_on_delete: bool,
    }

    #[async_trait]
    impl ContentStore for FaultyStore {
        async fn query(
            &self,
            query: &ContentQuery,
            continuation: Option<&ContinuationToken>,
        ) -> StoreResult<QueryPage> {
            let index = self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_query == Some(index) {
                return Err(StoreError::Transport("connection reset".into()));
            }
            self.inner.query(query, continuation).await
        }

        async fn batch_delete(&self, keys: &[TableKey]) -> StoreResult<()> {
            let index = self.deletes.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delete_delay {
                tokio::time::sleep(delay).await;
            }
            if self.panic_on_delete {
                panic!("store client poisoned");
            }
            if self.reject_delete == Some(index) {
                return Err(StoreError::Validation {
                    count: 26,
                    max: 25,
                });
            }
            self.inner.batch_delete(keys).await
        }

        async fn batch_put(&self, items: &[ContentItem]) -> StoreResult<()> {
            self.inner.batch_put(items).await
        }

        fn backend_name(&self) -> &'static str {
            "faulty"
        }
    }

    impl FaultyStore {
        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }

        fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    async fn seeded(store: FaultyStore, count: usize) -> Arc<FaultyStore> {
        seed_account(&store.inner, &KeySchema::default(), "a1", count)
            .await
            .unwrap();
        Arc::new(store)
    }

    fn orchestrator(
        store: Arc<FaultyStore>,
        page_size: u32,
        consumers: usize,
        dispatch: DispatchPolicy,
    ) -> Orchestrator {
        Orchestrator::with_settings(
            store,
            KeySchema::default(),
            page_size,
            PipelineConfig {
                consumers,
                channel_capacity: 1,
                dispatch,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_account_succeeds_without_batches() {
        let store = seeded(FaultyStore::default(), 0).await;
        let orch = orchestrator(store.clone(), 500, 2, DispatchPolicy::PerPage);

        let report = orch
            .process(&CancellationToken::new(), "a1")
            .await
            .unwrap();

        assert_eq!(report.producer.pages_fetched, 1);
        assert_eq!(report.producer.batches_dispatched, 0);
        assert_eq!(store.deletes(), 0);
        assert!(report.is_complete());
        assert!(report.all_workers_exited(WorkerExit::Quit));
        assert_eq!(orch.state(), PurgeState::Done);
    }

    #[rstest]
    #[case::single_page(30, DispatchPolicy::PerPage)]
    #[case::two_pages(15, DispatchPolicy::PerPage)]
    #[case::two_pages_accumulated(15, DispatchPolicy::Accumulate)]
    #[tokio::test]
    async fn test_thirty_records_take_two_batches(
        #[case] page_size: u32,
        #[case] dispatch: DispatchPolicy,
    ) {
        let store = seeded(FaultyStore::default(), 30).await;
        let orch = orchestrator(store.clone(), page_size, 2, dispatch);

        let report = orch
            .process(&CancellationToken::new(), "a1")
            .await
            .unwrap();

        assert_eq!(store.deletes(), 2);
        assert_eq!(report.batches_deleted(), 2);
        assert_eq!(report.records_deleted(), 30);
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_cancels_workers() {
        let store = seeded(
            FaultyStore {
                fail_query: Some(1),
                ..Default::default()
            },
            75,
        )
        .await;
        let orch = orchestrator(store.clone(), 25, 3, DispatchPolicy::PerPage);

        let (report, result) = orch
            .process_with_report(&CancellationToken::new(), "a1")
            .await;

        assert!(matches!(
            result,
            Err(PurgeError::Fetch(StoreError::Transport(_)))
        ));
        assert_eq!(store.queries(), 2);
        assert_eq!(report.producer.pages_fetched, 1);
        assert_eq!(report.producer.batches_dispatched, 1);
        assert_eq!(report.workers.len(), 3);
        assert!(report.all_workers_exited(WorkerExit::Cancelled));
        assert_eq!(orch.state(), PurgeState::Failed);
    }

    #[tokio::test]
    async fn test_rejected_batch_is_reported_not_fatal() {
        let store = seeded(
            FaultyStore {
                reject_delete: Some(0),
                ..Default::default()
            },
            50,
        )
        .await;
        let orch = orchestrator(store.clone(), 500, 1, DispatchPolicy::PerPage);

        let report = orch
            .process(&CancellationToken::new(), "a1")
            .await
            .unwrap();

        assert_eq!(store.deletes(), 2);
        assert_eq!(report.batches_failed(), 1);
        assert_eq!(report.batches_deleted(), 1);
        assert_eq!(store.inner.len(), 25);
        assert!(!report.is_complete());
        assert_eq!(orch.state(), PurgeState::Done);
    }

    #[rstest]
    #[tokio::test]
    async fn test_terminates_and_deletes_everything(
        #[values(1, 2, 5)] consumers: usize,
        #[values(0, 1, 25, 26, 120)] records: usize,
    ) {
        let store = seeded(FaultyStore::default(), records).await;
        let orch = orchestrator(store.clone(), 40, consumers, DispatchPolicy::PerPage);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            orch.process(&CancellationToken::new(), "a1"),
        )
        .await
        .expect("run did not terminate")
        .unwrap();

        assert_eq!(report.workers.len(), consumers);
        assert!(report.all_workers_exited(WorkerExit::Quit));
        assert_eq!(report.producer.pages_fetched as usize, records.div_ceil(40).max(1));
        assert_eq!(store.deletes(), records.div_ceil(25));
        assert_eq!(report.records_deleted() as usize, records);
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let store = seeded(FaultyStore::default(), 100).await;
        let orch = orchestrator(store, 25, 2, DispatchPolicy::PerPage);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch.process(&cancel, "a1").await.unwrap_err();
        assert!(matches!(err, PurgeError::Cancelled));
        assert_eq!(orch.state(), PurgeState::Failed);
    }

    #[rstest]
    #[case::producer_blocked(1)]
    #[case::draining(10)]
    #[tokio::test]
    async fn test_cancellation_mid_run_joins_every_worker(#[case] channel_capacity: usize) {
        let store = seeded(
            FaultyStore {
                delete_delay: Some(Duration::from_millis(50)),
                ..Default::default()
            },
            250,
        )
        .await;
        let orch = Orchestrator::with_settings(
            store.clone(),
            KeySchema::default(),
            500,
            PipelineConfig {
                consumers: 2,
                channel_capacity,
                dispatch: DispatchPolicy::PerPage,
            },
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            trigger.cancel();
        });

        let (report, result) = tokio::time::timeout(
            Duration::from_secs(5),
            orch.process_with_report(&cancel, "a1"),
        )
        .await
        .expect("run did not terminate");

        assert!(matches!(result, Err(PurgeError::Cancelled)));
        assert_eq!(report.workers.len(), 2);
        assert!(report.all_workers_exited(WorkerExit::Cancelled));
        assert!(report.records_deleted() < 250);
        assert_eq!(store.inner.len() as u64, 250 - report.records_deleted());
        assert_eq!(orch.state(), PurgeState::Failed);
    }

    #[tokio::test]
    async fn test_worker_panic_is_not_reported_as_cancellation() {
        let store = seeded(
            FaultyStore {
                panic_on_delete: true,
                ..Default::default()
            },
            250,
        )
        .await;
        let orch = orchestrator(store, 500, 2, DispatchPolicy::PerPage);

        let (report, result) = orch
            .process_with_report(&CancellationToken::new(), "a1")
            .await;

        assert!(matches!(result, Err(PurgeError::Join(_))));
        assert!(report.workers.is_empty());
        assert_eq!(report.producer.records_found, 250);
        assert_eq!(orch.state(), PurgeState::Failed);
    }

    #[tokio::test]
    async fn test_subscribers_see_final_state() {
        let store = seeded(FaultyStore::default(), 10).await;
        let orch = orchestrator(store, 500, 1, DispatchPolicy::PerPage);
        let mut rx = orch.subscribe();
        assert_eq!(*rx.borrow(), PurgeState::Idle);

        orch.process(&CancellationToken::new(), "a1").await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), PurgeState::Done);
    }
}

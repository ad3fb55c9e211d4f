use std::time::Duration;

/// How a deletion worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Received its quit signal after the scan completed.
    Quit,
    /// Observed cancellation.
    Cancelled,
}

/// A batch delete that failed and was skipped.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub worker: usize,
    pub batch_size: usize,
    pub error: String,
}

/// Counters from the fetch-and-dispatch side of a run.
#[derive(Debug, Default, Clone)]
pub struct ProducerStats {
    pub pages_fetched: u64,
    /// Pages whose payload could not be decoded and were skipped.
    pub pages_dropped: u64,
    pub records_found: u64,
    pub batches_dispatched: u64,
}

/// Results from one deletion worker.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub exit: WorkerExit,
    pub batches_deleted: u64,
    pub records_deleted: u64,
    pub failures: Vec<BatchFailure>,
}

impl WorkerReport {
    pub(crate) fn new(worker: usize) -> Self {
        Self {
            worker,
            exit: WorkerExit::Cancelled,
            batches_deleted: 0,
            records_deleted: 0,
            failures: Vec::new(),
        }
    }
}

/// Results from a single account deletion run.
///
/// Batch delete failures do not fail the run; they are collected here so
/// callers can tell a complete deletion from a partial one.
#[derive(Debug, Default, Clone)]
pub struct DeletionReport {
    pub account_id: String,
    pub producer: ProducerStats,
    pub workers: Vec<WorkerReport>,
    pub duration: Duration,
}

impl DeletionReport {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    pub fn batches_deleted(&self) -> u64 {
        self.workers.iter().map(|w| w.batches_deleted).sum()
    }

    pub fn records_deleted(&self) -> u64 {
        self.workers.iter().map(|w| w.records_deleted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.workers.iter().flat_map(|w| w.failures.iter())
    }

    pub fn batches_failed(&self) -> usize {
        self.workers.iter().map(|w| w.failures.len()).sum()
    }

    /// True when every dispatched batch was deleted and no page was dropped.
    pub fn is_complete(&self) -> bool {
        self.batches_failed() == 0
            && self.producer.pages_dropped == 0
            && self.batches_deleted() == self.producer.batches_dispatched
    }

    /// Check if any records were deleted.
    pub fn has_deletions(&self) -> bool {
        self.records_deleted() > 0
    }

    pub fn all_workers_exited(&self, exit: WorkerExit) -> bool {
        self.workers.iter().all(|w| w.exit == exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: usize, deleted: u64, failures: usize) -> WorkerReport {
        WorkerReport {
            worker: id,
            exit: WorkerExit::Quit,
            batches_deleted: deleted,
            records_deleted: deleted * 25,
            failures: (0..failures)
                .map(|_| BatchFailure {
                    worker: id,
                    batch_size: 25,
                    error: "boom".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_totals_across_workers() {
        let mut report = DeletionReport::new("a1");
        report.producer.batches_dispatched = 4;
        report.workers = vec![worker(0, 2, 0), worker(1, 1, 1)];

        assert_eq!(report.batches_deleted(), 3);
        assert_eq!(report.records_deleted(), 75);
        assert_eq!(report.batches_failed(), 1);
        assert!(report.has_deletions());
        assert!(!report.is_complete());
        assert!(report.all_workers_exited(WorkerExit::Quit));
    }

    #[test]
    fn test_empty_run_is_complete() {
        let report = DeletionReport::new("a1");
        assert!(report.is_complete());
        assert!(!report.has_deletions());
    }
}

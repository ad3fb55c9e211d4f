use thiserror::Error;

use crate::{queue::QueueError, store::StoreError};

#[derive(Debug, Error)]
pub enum PurgeError {
    /// A page fetch failed; the scan was aborted.
    #[error("Failed to fetch content records: {0}")]
    Fetch(#[source] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The run was cancelled before the quit protocol completed.
    #[error("Deletion cancelled")]
    Cancelled,

    /// Every deletion worker stopped while batches were still being published.
    #[error("All deletion workers stopped before the scan finished")]
    WorkersGone,

    /// A pipeline task panicked or was aborted.
    #[error("Pipeline task failed: {0}")]
    Join(String),
}

pub type PurgeResult<T> = Result<T, PurgeError>;

//! Producer/consumer deletion pipeline.
//!
//! One [`Orchestrator::process`] call deletes every content record of an
//! account: a producer pages through the records and publishes batches of at
//! most [`MAX_BATCH_SIZE`](crate::store::MAX_BATCH_SIZE) ids, and a pool of
//! workers issues one batch delete per batch.

mod consumer;
mod error;
mod orchestrator;
mod producer;
mod report;
mod splitter;

pub use error::{PurgeError, PurgeResult};
pub use orchestrator::{Orchestrator, PurgeState};
pub use report::{BatchFailure, DeletionReport, ProducerStats, WorkerExit, WorkerReport};
pub use splitter::split_batches;

/// Content ids of one account, deleted together in a single store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBatch {
    pub account_id: String,
    pub content_ids: Vec<String>,
}

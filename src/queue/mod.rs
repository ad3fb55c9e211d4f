//! Delete-request queue backends.

mod error;
mod memory;
#[cfg(feature = "sqs")]
mod sqs;
mod traits;

use std::sync::Arc;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryDeleteQueue;
#[cfg(feature = "sqs")]
pub use sqs::SqsDeleteQueue;
pub use traits::{DeleteQueue, DeleteRequestBody, DeleteRequestMessage};

use crate::config::{PurgeConfig, QueueBackend};

/// Create the configured delete queue.
pub async fn create_queue(config: &PurgeConfig) -> QueueResult<Arc<dyn DeleteQueue>> {
    let queue: Arc<dyn DeleteQueue> = match config.queue.backend {
        QueueBackend::Memory => Arc::new(MemoryDeleteQueue::new()),

        #[cfg(feature = "sqs")]
        QueueBackend::Sqs => Arc::new(SqsDeleteQueue::new(&config.aws, &config.queue).await?),
        #[cfg(not(feature = "sqs"))]
        QueueBackend::Sqs => {
            return Err(QueueError::NotConfigured(
                "SQS queue configured but the 'sqs' feature is not enabled. \
                Rebuild with: cargo build --features sqs"
                    .to_string(),
            ));
        }
    };

    tracing::debug!(backend = queue.backend_name(), "Delete queue initialized");
    Ok(queue)
}

//! Content store backends.

#[cfg(feature = "dynamodb")]
mod dynamodb;
mod error;
mod memory;
mod traits;

use std::sync::Arc;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbContentStore;
pub use error::{DecodeError, StoreError, StoreResult};
pub use memory::MemoryContentStore;
pub use traits::{
    ContentItem, ContentQuery, ContentRecord, ContentStore, ContinuationToken, KeySchema,
    MAX_BATCH_SIZE, PROJECTION, QueryPage, TableKey,
};

use crate::config::{PurgeConfig, StoreBackend};

/// Create the configured content store.
pub async fn create_store(config: &PurgeConfig) -> StoreResult<Arc<dyn ContentStore>> {
    let store: Arc<dyn ContentStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryContentStore::new()),

        #[cfg(feature = "dynamodb")]
        StoreBackend::Dynamodb => Arc::new(
            DynamoDbContentStore::new(&config.aws, config.store.table_name.clone()).await,
        ),
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::Dynamodb => {
            return Err(StoreError::NotConfigured(
                "DynamoDB store configured but the 'dynamodb' feature is not enabled. \
                Rebuild with: cargo build --features dynamodb"
                    .to_string(),
            ));
        }
    };

    tracing::debug!(backend = store.backend_name(), "Content store initialized");
    Ok(store)
}

//! Test data generation for an account.

use chrono::Utc;
use uuid::Uuid;

use crate::store::{
    ContentItem, ContentRecord, ContentStore, KeySchema, MAX_BATCH_SIZE, StoreResult,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Write `count` content records with random ids under `account_id`.
///
/// Items are written in batches of at most [`MAX_BATCH_SIZE`]. Returns the
/// number of records written.
pub async fn seed_account(
    store: &dyn ContentStore,
    schema: &KeySchema,
    account_id: &str,
    count: usize,
) -> StoreResult<usize> {
    let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
    let items: Vec<ContentItem> = (0..count)
        .map(|_| {
            let record = ContentRecord::new(account_id, Uuid::new_v4().to_string());
            ContentItem {
                key: schema.table_key(&record.account_id, &record.content_id),
                record,
                created: now.clone(),
                modified: now.clone(),
            }
        })
        .collect();

    for chunk in items.chunks(MAX_BATCH_SIZE) {
        store.batch_put(chunk).await?;
    }

    tracing::info!(
        account_id,
        records = count,
        backend = store.backend_name(),
        "Seeded content records"
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryContentStore;

    #[tokio::test]
    async fn test_seed_writes_under_account_partition() {
        let store = MemoryContentStore::new();
        let schema = KeySchema::default();

        let written = seed_account(&store, &schema, "a1", 60).await.unwrap();
        seed_account(&store, &schema, "a2", 3).await.unwrap();

        assert_eq!(written, 60);
        assert_eq!(store.count_partition("ACCT#a1"), 60);
        assert_eq!(store.count_partition("ACCT#a2"), 3);
    }

    #[tokio::test]
    async fn test_seed_uses_uuid_content_ids() {
        let store = MemoryContentStore::new();
        let schema = KeySchema::default();
        seed_account(&store, &schema, "a1", 1).await.unwrap();

        let page = store
            .query(&schema.content_query("a1", 10), None)
            .await
            .unwrap();
        let records = page.records.unwrap();
        assert_eq!(records.len(), 1);
        assert!(Uuid::parse_str(&records[0].content_id).is_ok());
    }
}

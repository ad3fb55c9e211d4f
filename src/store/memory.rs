//! In-memory content store.
//!
//! Keeps items in an ordered map so prefix queries page through sort keys the
//! same way a key-condition query does. Intended for development and tests.

use std::{collections::BTreeMap, ops::Bound};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    ContentItem, ContentQuery, ContentStore, ContinuationToken, QueryPage, StoreResult, TableKey,
    traits::ensure_batch_size,
};

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    items: RwLock<BTreeMap<TableKey, ContentItem>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored items across all partitions.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Number of items stored under one partition key.
    pub fn count_partition(&self, partition_key: &str) -> usize {
        self.items
            .read()
            .keys()
            .filter(|k| k.partition_key == partition_key)
            .count()
    }

    pub fn contains(&self, key: &TableKey) -> bool {
        self.items.read().contains_key(key)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn query(
        &self,
        query: &ContentQuery,
        continuation: Option<&ContinuationToken>,
    ) -> StoreResult<QueryPage> {
        let start = match continuation {
            Some(token) => Bound::Excluded(token.last_key.clone()),
            None => Bound::Included(TableKey {
                partition_key: query.partition_key.clone(),
                sort_key: query.sort_key_prefix.clone(),
            }),
        };

        let items = self.items.read();
        let mut matching = items
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| {
                k.partition_key == query.partition_key
                    && k.sort_key.starts_with(&query.sort_key_prefix)
            })
            .map(|(_, item)| item);

        let limit = query.page_size.max(1) as usize;
        let page: Vec<&ContentItem> = matching.by_ref().take(limit).collect();
        let has_more = matching.next().is_some();

        let continuation = match (has_more, page.last()) {
            (true, Some(last)) => Some(ContinuationToken::after(last.key.clone())),
            _ => None,
        };

        Ok(QueryPage {
            records: Ok(page.into_iter().map(|item| item.record.clone()).collect()),
            continuation,
        })
    }

    async fn batch_delete(&self, keys: &[TableKey]) -> StoreResult<()> {
        ensure_batch_size(keys.len())?;
        let mut items = self.items.write();
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }

    async fn batch_put(&self, batch: &[ContentItem]) -> StoreResult<()> {
        ensure_batch_size(batch.len())?;
        let mut items = self.items.write();
        for item in batch {
            items.insert(item.key.clone(), item.clone());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ContentRecord, KeySchema, MAX_BATCH_SIZE};

    fn item(schema: &KeySchema, account: &str, content: &str) -> ContentItem {
        ContentItem {
            key: schema.table_key(account, content),
            record: ContentRecord::new(account, content),
            created: "2024-01-01T00:00:00Z".to_string(),
            modified: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    async fn seeded(schema: &KeySchema, account: &str, count: usize) -> MemoryContentStore {
        let store = MemoryContentStore::new();
        let items: Vec<_> = (0..count)
            .map(|i| item(schema, account, &format!("c-{i:04}")))
            .collect();
        for chunk in items.chunks(MAX_BATCH_SIZE) {
            store.batch_put(chunk).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_query_pages_until_exhausted() {
        let schema = KeySchema::default();
        let store = seeded(&schema, "a1", 7).await;
        let query = schema.content_query("a1", 3);

        let mut sizes = Vec::new();
        let mut token = None;
        loop {
            let page = store.query(&query, token.as_ref()).await.unwrap();
            sizes.push(page.records.unwrap().len());
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_query_exact_multiple_has_no_trailing_page() {
        let schema = KeySchema::default();
        let store = seeded(&schema, "a1", 6).await;
        let query = schema.content_query("a1", 3);

        let first = store.query(&query, None).await.unwrap();
        let second = store
            .query(&query, first.continuation.as_ref())
            .await
            .unwrap();
        assert_eq!(second.records.unwrap().len(), 3);
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn test_query_is_scoped_to_partition_and_prefix() {
        let schema = KeySchema::default();
        let store = seeded(&schema, "a1", 2).await;
        store.batch_put(&[item(&schema, "a2", "other")]).await.unwrap();

        // Same partition, different record kind
        let mut profile = item(&schema, "a1", "x");
        profile.key.sort_key = "PROF#a1".to_string();
        store.batch_put(&[profile]).await.unwrap();

        let page = store
            .query(&schema.content_query("a1", 100), None)
            .await
            .unwrap();
        let records = page.records.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.account_id == "a1"));
        assert!(page.continuation.is_none());
    }

    #[tokio::test]
    async fn test_query_empty_partition() {
        let schema = KeySchema::default();
        let store = MemoryContentStore::new();
        let page = store
            .query(&schema.content_query("nobody", 500), None)
            .await
            .unwrap();
        assert!(page.records.unwrap().is_empty());
        assert!(page.continuation.is_none());
    }

    #[tokio::test]
    async fn test_batch_delete_is_idempotent() {
        let schema = KeySchema::default();
        let store = seeded(&schema, "a1", 3).await;
        let keys: Vec<_> = (0..3)
            .map(|i| schema.table_key("a1", &format!("c-{i:04}")))
            .collect();

        store.batch_delete(&keys).await.unwrap();
        assert!(store.is_empty());

        // Deleting absent keys is a no-op, not an error
        store.batch_delete(&keys).await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_delete_rejects_oversized_batch() {
        let schema = KeySchema::default();
        let store = seeded(&schema, "a1", 26).await;
        let keys: Vec<_> = (0..26)
            .map(|i| schema.table_key("a1", &format!("c-{i:04}")))
            .collect();

        let err = store.batch_delete(&keys).await.unwrap_err();
        assert!(err.is_validation());
        // Nothing removed
        assert_eq!(store.len(), 26);
    }
}

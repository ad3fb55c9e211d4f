use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DecodeError, StoreResult};

/// Maximum number of keys the store accepts in one batch write call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Attribute names projected by content queries.
pub const PROJECTION: &[&str] = &["account_id", "content_id"];

/// Prefixes that map account and content identifiers onto table keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub partition_prefix: String,
    pub sort_prefix: String,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self {
            partition_prefix: "ACCT#".to_string(),
            sort_prefix: "CTNT#".to_string(),
        }
    }
}

impl KeySchema {
    pub fn partition_key(&self, account_id: &str) -> String {
        format!("{}{}", self.partition_prefix, account_id)
    }

    pub fn sort_key(&self, content_id: &str) -> String {
        format!("{}{}", self.sort_prefix, content_id)
    }

    pub fn table_key(&self, account_id: &str, content_id: &str) -> TableKey {
        TableKey {
            partition_key: self.partition_key(account_id),
            sort_key: self.sort_key(content_id),
        }
    }

    /// Query selecting every content record of one account.
    pub fn content_query(&self, account_id: &str, page_size: u32) -> ContentQuery {
        ContentQuery {
            partition_key: self.partition_key(account_id),
            sort_key_prefix: self.sort_prefix.clone(),
            projection: PROJECTION.iter().map(|s| s.to_string()).collect(),
            page_size,
        }
    }
}

/// A content record as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRecord {
    pub account_id: String,
    pub content_id: String,
}

impl ContentRecord {
    pub fn new(account_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            content_id: content_id.into(),
        }
    }
}

/// A full record as written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub key: TableKey,
    pub record: ContentRecord,
    /// `%Y-%m-%dT%H:%M:%SZ`, UTC.
    pub created: String,
    pub modified: String,
}

/// Physical key of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub partition_key: String,
    pub sort_key: String,
}

/// Cursor returned by a paged query; pass it back to resume after the last
/// returned record.
#[derive(Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub(crate) last_key: TableKey,
}

impl ContinuationToken {
    pub(crate) fn after(last_key: TableKey) -> Self {
        Self { last_key }
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContinuationToken")
            .field(&self.last_key.sort_key)
            .finish()
    }
}

/// Key-condition query over one partition, restricted to a sort-key prefix.
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub partition_key: String,
    pub sort_key_prefix: String,
    pub projection: Vec<String>,
    pub page_size: u32,
}

/// One page of query results.
///
/// `records` is an `Err` when the page payload could not be decoded; the
/// continuation token is still valid in that case.
#[derive(Debug)]
pub struct QueryPage {
    pub records: Result<Vec<ContentRecord>, DecodeError>,
    pub continuation: Option<ContinuationToken>,
}

/// Paged key-value store holding content records.
///
/// Implementations are shared across the producer and every deletion worker,
/// so they must be safe for concurrent use.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch one page of records, starting after `continuation` if given.
    async fn query(
        &self,
        query: &ContentQuery,
        continuation: Option<&ContinuationToken>,
    ) -> StoreResult<QueryPage>;

    /// Delete up to [`MAX_BATCH_SIZE`] records. Absent keys are not an error.
    async fn batch_delete(&self, keys: &[TableKey]) -> StoreResult<()>;

    /// Write up to [`MAX_BATCH_SIZE`] items.
    async fn batch_put(&self, items: &[ContentItem]) -> StoreResult<()>;

    /// Short backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Reject batches over the store ceiling before they reach the backend.
pub(crate) fn ensure_batch_size(count: usize) -> StoreResult<()> {
    if count > MAX_BATCH_SIZE {
        return Err(super::StoreError::Validation {
            count,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schema_derives_keys() {
        let schema = KeySchema::default();
        let key = schema.table_key("acct-1", "c-9");
        assert_eq!(key.partition_key, "ACCT#acct-1");
        assert_eq!(key.sort_key, "CTNT#c-9");
    }

    #[test]
    fn test_content_query_projects_ids_only() {
        let query = KeySchema::default().content_query("acct-1", 500);
        assert_eq!(query.partition_key, "ACCT#acct-1");
        assert_eq!(query.sort_key_prefix, "CTNT#");
        assert_eq!(query.projection, vec!["account_id", "content_id"]);
        assert_eq!(query.page_size, 500);
    }

    #[test]
    fn test_ensure_batch_size() {
        assert!(ensure_batch_size(0).is_ok());
        assert!(ensure_batch_size(MAX_BATCH_SIZE).is_ok());

        let err = ensure_batch_size(26).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "number of requests cannot exceed 25 items, got 26"
        );
    }
}

//! DynamoDB content store.
//!
//! Records live in a single table keyed by `PK` (partition) and `SK` (sort).
//! Queries use `PK = :pkVal AND begins_with(SK, :skPrefix)` and page with
//! `ExclusiveStartKey`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client,
    types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest},
};
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::{debug, error, instrument, warn};

use super::{
    ContentItem, ContentQuery, ContentRecord, ContentStore, ContinuationToken, DecodeError,
    QueryPage, StoreError, StoreResult, TableKey, traits::ensure_batch_size,
};
use crate::config::AwsConfig;

const PARTITION_KEY_ATTR: &str = "PK";
const SORT_KEY_ATTR: &str = "SK";
const KEY_CONDITION: &str = "PK = :pkVal AND begins_with(SK, :skPrefix)";

type Item = HashMap<String, AttributeValue>;

pub struct DynamoDbContentStore {
    client: Client,
    table_name: String,
}

impl DynamoDbContentStore {
    pub async fn new(aws: &AwsConfig, table_name: String) -> Self {
        debug!(table = %table_name, region = ?aws.region, "Initializing DynamoDB content store");

        let sdk_config = crate::aws::load_sdk_config(aws).await;

        let mut ddb_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &aws.endpoint_url {
            ddb_config = ddb_config.endpoint_url(endpoint);
        }

        Self::from_client(Client::from_conf(ddb_config.build()), table_name)
    }

    pub fn from_client(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>, action: &str) -> StoreResult<()> {
        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!(error = %message, table = %self.table_name, "Failed to {} items", action);
                StoreError::Transport(message)
            })?;

        let unprocessed: usize = output
            .unprocessed_items()
            .map(|tables| tables.values().map(Vec::len).sum())
            .unwrap_or(0);
        if unprocessed > 0 {
            warn!(unprocessed, table = %self.table_name, "Batch write left items unprocessed");
            return Err(StoreError::Transport(format!(
                "{} items left unprocessed by batch {}",
                unprocessed, action
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ContentStore for DynamoDbContentStore {
    #[instrument(
        skip(self, query, continuation),
        fields(table = %self.table_name, partition = %query.partition_key)
    )]
    async fn query(
        &self,
        query: &ContentQuery,
        continuation: Option<&ContinuationToken>,
    ) -> StoreResult<QueryPage> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression(KEY_CONDITION)
            .expression_attribute_values(":pkVal", AttributeValue::S(query.partition_key.clone()))
            .expression_attribute_values(
                ":skPrefix",
                AttributeValue::S(query.sort_key_prefix.clone()),
            )
            .projection_expression(query.projection.join(", "))
            .limit(i32::try_from(query.page_size).unwrap_or(i32::MAX))
            .set_exclusive_start_key(continuation.map(|token| key_attributes(&token.last_key)))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!(error = %message, "Failed to query content records");
                StoreError::Transport(message)
            })?;

        let continuation = output
            .last_evaluated_key()
            .map(|key| {
                decode_table_key(key)
                    .map(ContinuationToken::after)
                    .map_err(|e| {
                        StoreError::Transport(format!("Malformed LastEvaluatedKey: {}", e))
                    })
            })
            .transpose()?;

        Ok(QueryPage {
            records: decode_records(output.items()),
            continuation,
        })
    }

    #[instrument(skip(self, keys), fields(table = %self.table_name, count = keys.len()))]
    async fn batch_delete(&self, keys: &[TableKey]) -> StoreResult<()> {
        ensure_batch_size(keys.len())?;
        if keys.is_empty() {
            return Ok(());
        }

        let requests = keys
            .iter()
            .map(|key| {
                let delete = DeleteRequest::builder()
                    .set_key(Some(key_attributes(key)))
                    .build()
                    .map_err(|e| StoreError::Transport(format!("Invalid delete request: {}", e)))?;
                Ok(WriteRequest::builder().delete_request(delete).build())
            })
            .collect::<StoreResult<Vec<_>>>()?;

        self.batch_write(requests, "delete").await
    }

    #[instrument(skip(self, items), fields(table = %self.table_name, count = items.len()))]
    async fn batch_put(&self, items: &[ContentItem]) -> StoreResult<()> {
        ensure_batch_size(items.len())?;
        if items.is_empty() {
            return Ok(());
        }

        let requests = items
            .iter()
            .map(|item| {
                let put = PutRequest::builder()
                    .set_item(Some(item_attributes(item)))
                    .build()
                    .map_err(|e| StoreError::Transport(format!("Invalid put request: {}", e)))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<StoreResult<Vec<_>>>()?;

        self.batch_write(requests, "put").await
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}

fn key_attributes(key: &TableKey) -> Item {
    HashMap::from([
        (
            PARTITION_KEY_ATTR.to_string(),
            AttributeValue::S(key.partition_key.clone()),
        ),
        (
            SORT_KEY_ATTR.to_string(),
            AttributeValue::S(key.sort_key.clone()),
        ),
    ])
}

fn item_attributes(item: &ContentItem) -> Item {
    let mut attrs = key_attributes(&item.key);
    attrs.insert(
        "account_id".to_string(),
        AttributeValue::S(item.record.account_id.clone()),
    );
    attrs.insert(
        "content_id".to_string(),
        AttributeValue::S(item.record.content_id.clone()),
    );
    attrs.insert("created".to_string(), AttributeValue::S(item.created.clone()));
    attrs.insert("modified".to_string(), AttributeValue::S(item.modified.clone()));
    attrs
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str, DecodeError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.as_str()),
        Some(other) => Err(DecodeError(format!(
            "attribute '{}' is not a string: {:?}",
            name, other
        ))),
        None => Err(DecodeError(format!("missing attribute '{}'", name))),
    }
}

/// Decode a whole page; one malformed item fails the page.
fn decode_records(items: &[Item]) -> Result<Vec<ContentRecord>, DecodeError> {
    items
        .iter()
        .map(|item| {
            Ok(ContentRecord::new(
                string_attr(item, "account_id")?,
                string_attr(item, "content_id")?,
            ))
        })
        .collect()
}

fn decode_table_key(item: &Item) -> Result<TableKey, DecodeError> {
    Ok(TableKey {
        partition_key: string_attr(item, PARTITION_KEY_ATTR)?.to_string(),
        sort_key: string_attr(item, SORT_KEY_ATTR)?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KeySchema;

    fn record_item(account: &str, content: &str) -> Item {
        HashMap::from([
            ("account_id".to_string(), AttributeValue::S(account.to_string())),
            ("content_id".to_string(), AttributeValue::S(content.to_string())),
        ])
    }

    #[test]
    fn test_decode_records() {
        let items = vec![record_item("a1", "c1"), record_item("a1", "c2")];
        let records = decode_records(&items).unwrap();
        assert_eq!(
            records,
            vec![ContentRecord::new("a1", "c1"), ContentRecord::new("a1", "c2")]
        );
    }

    #[test]
    fn test_decode_records_fails_whole_page() {
        let mut bad = record_item("a1", "c2");
        bad.insert("content_id".to_string(), AttributeValue::N("7".to_string()));
        let items = vec![record_item("a1", "c1"), bad];

        let err = decode_records(&items).unwrap_err();
        assert!(err.0.contains("content_id"));
    }

    #[test]
    fn test_decode_records_missing_attribute() {
        let items = vec![HashMap::from([(
            "account_id".to_string(),
            AttributeValue::S("a1".to_string()),
        )])];
        let err = decode_records(&items).unwrap_err();
        assert_eq!(err.0, "missing attribute 'content_id'");
    }

    #[test]
    fn test_key_round_trips_through_attributes() {
        let key = KeySchema::default().table_key("a1", "c1");
        let attrs = key_attributes(&key);
        assert_eq!(attrs.len(), 2);
        assert_eq!(decode_table_key(&attrs).unwrap(), key);
    }

    #[test]
    fn test_item_attributes_include_timestamps() {
        let item = ContentItem {
            key: KeySchema::default().table_key("a1", "c1"),
            record: ContentRecord::new("a1", "c1"),
            created: "2024-05-01T10:00:00Z".to_string(),
            modified: "2024-05-01T10:00:00Z".to_string(),
        };
        let attrs = item_attributes(&item);
        assert_eq!(attrs.len(), 6);
        assert_eq!(
            attrs.get("SK"),
            Some(&AttributeValue::S("CTNT#c1".to_string()))
        );
        assert_eq!(
            attrs.get("created"),
            Some(&AttributeValue::S("2024-05-01T10:00:00Z".to_string()))
        );
    }
}

//! Content store configuration.
//!
//! # Example
//!
//! ```toml
//! [store]
//! backend = "dynamodb"
//! table_name = "items"
//! partition_prefix = "ACCT#"
//! sort_prefix = "CTNT#"
//! page_size = 500
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::store::KeySchema;

/// Which store implementation backs the pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process ordered map. Data is lost on exit; for development and tests.
    #[default]
    Memory,
    /// Amazon DynamoDB (or a compatible endpoint such as localstack).
    Dynamodb,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Dynamodb => "dynamodb",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Table holding the content records.
    /// Default: "items"
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Prefix prepended to the account id to form the partition key.
    /// Default: "ACCT#"
    #[serde(default = "default_partition_prefix")]
    pub partition_prefix: String,

    /// Prefix prepended to the content id to form the sort key. Also used as
    /// the `begins_with` filter that selects content records in a partition.
    /// Default: "CTNT#"
    #[serde(default = "default_sort_prefix")]
    pub sort_prefix: String,

    /// Maximum records fetched per query page.
    /// Default: 500
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            table_name: default_table_name(),
            partition_prefix: default_partition_prefix(),
            sort_prefix: default_sort_prefix(),
            page_size: default_page_size(),
        }
    }
}

impl StoreConfig {
    pub fn key_schema(&self) -> KeySchema {
        KeySchema {
            partition_prefix: self.partition_prefix.clone(),
            sort_prefix: self.sort_prefix.clone(),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "store.page_size must be greater than 0".into(),
            ));
        }
        if self.partition_prefix.is_empty() || self.sort_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "store.partition_prefix and store.sort_prefix must not be empty".into(),
            ));
        }
        if self.backend == StoreBackend::Dynamodb && self.table_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.table_name is required for the dynamodb backend".into(),
            ));
        }
        Ok(())
    }
}

fn default_table_name() -> String {
    "items".to_string()
}

fn default_partition_prefix() -> String {
    "ACCT#".to_string()
}

fn default_sort_prefix() -> String {
    "CTNT#".to_string()
}

fn default_page_size() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.table_name, "items");
        assert_eq!(config.page_size, 500);
        assert_eq!(config.key_schema(), KeySchema::default());
    }

    #[test]
    fn test_parse_dynamodb() {
        let config: StoreConfig = toml::from_str(
            r#"
            backend = "dynamodb"
            table_name = "content"
            page_size = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Dynamodb);
        assert_eq!(config.table_name, "content");
        assert_eq!(config.page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let config = StoreConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result: Result<StoreConfig, _> = toml::from_str("tabel_name = \"typo\"");
        assert!(result.is_err());
    }
}

//! Configuration module for the content purge worker.
//!
//! The worker is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [aws]
//! region = "us-west-2"
//! endpoint_url = "http://localhost:4566"
//!
//! [store]
//! backend = "dynamodb"
//! table_name = "items"
//!
//! [queue]
//! backend = "sqs"
//! queue_name = "delete-items"
//!
//! [pipeline]
//! consumers = 2
//! ```

mod aws;
mod observability;
mod pipeline;
mod queue;
mod store;

use std::path::Path;

pub use aws::*;
pub use observability::*;
pub use pipeline::*;
pub use queue::*;
use serde::{Deserialize, Serialize};
pub use store::*;

/// Root configuration.
///
/// Every section is optional; an empty file runs the pipeline against the
/// in-memory store and queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeConfig {
    /// AWS connection settings shared by the DynamoDB and SQS backends.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Content store holding the records to delete.
    #[serde(default)]
    pub store: StoreConfig,

    /// Queue delivering delete requests.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Producer/consumer pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Queue polling loop.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl PurgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: PurgeConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.queue.validate()?;
        self.pipeline.validate()?;
        self.observability.metrics.validate()?;
        self.check_disabled_features()
    }

    /// Reject backends whose cargo feature is not compiled into this binary,
    /// with a message naming the feature to enable.
    fn check_disabled_features(&self) -> Result<(), ConfigError> {
        let mut issues: Vec<(String, &str)> = Vec::new();

        if self.store.backend == StoreBackend::Dynamodb && !cfg!(feature = "dynamodb") {
            issues.push(("store.backend = \"dynamodb\"".to_string(), "dynamodb"));
        }
        if self.queue.backend == QueueBackend::Sqs && !cfg!(feature = "sqs") {
            issues.push(("queue.backend = \"sqs\"".to_string(), "sqs"));
        }
        if self.observability.metrics.enabled && !cfg!(feature = "prometheus") {
            issues.push((
                "observability.metrics.enabled = true".to_string(),
                "prometheus",
            ));
        }

        if issues.is_empty() {
            return Ok(());
        }

        let details: Vec<String> = issues
            .iter()
            .map(|(setting, feature)| format!("  - {} requires the '{}' feature", setting, feature))
            .collect();
        let features: Vec<&str> = issues.iter().map(|(_, f)| *f).collect();

        Err(ConfigError::Validation(format!(
            "Configuration uses features that are not compiled into this binary:\n{}\n\
             Rebuild with: cargo build --features {}",
            details.join("\n"),
            features.join(",")
        )))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand `${VAR}` references, skipping any that appear after a `#` comment
/// marker on the same line.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("Invalid env var pattern: {}", e)))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

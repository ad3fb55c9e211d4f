//! Deletion pipeline and queue worker configuration.
//!
//! # Example
//!
//! ```toml
//! [pipeline]
//! consumers = 2
//! channel_capacity = 1
//! dispatch = "per_page"
//!
//! [worker]
//! idle_interval_ms = 1000
//! acknowledge = true
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// How the producer turns pages into delete batches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Publish batches as each page arrives, carrying a short tail into the
    /// next page. Memory is bounded by one page.
    #[default]
    PerPage,
    /// Read every page first, then split and publish.
    Accumulate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Number of concurrent deletion workers.
    /// Default: 2
    #[serde(default = "default_consumers")]
    pub consumers: usize,

    /// Work channel capacity in batches. The producer blocks when it is full.
    /// Default: 1
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub dispatch: DispatchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            consumers: default_consumers(),
            channel_capacity: default_channel_capacity(),
            dispatch: DispatchPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.consumers == 0 {
            return Err(ConfigError::Validation(
                "pipeline.consumers must be at least 1".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "pipeline.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_consumers() -> usize {
    2
}

fn default_channel_capacity() -> usize {
    1
}

/// Queue polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue returned nothing.
    /// Default: 1000
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Delete the queue message after a successful run. When false the
    /// message becomes visible again after its visibility timeout.
    /// Default: true
    #[serde(default = "default_true")]
    pub acknowledge: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval_ms(),
            acknowledge: true,
        }
    }
}

impl WorkerConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

fn default_idle_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

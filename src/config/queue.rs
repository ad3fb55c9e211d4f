//! Delete-request queue configuration.

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// In-process queue. Messages are lost on exit.
    #[default]
    Memory,
    /// Amazon SQS (or a compatible endpoint such as localstack).
    Sqs,
}

impl QueueBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueBackend::Memory => "memory",
            QueueBackend::Sqs => "sqs",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,

    /// Queue name, resolved to a URL when the SQS client starts.
    /// Default: "delete-items"
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Long-poll wait per receive call, in seconds (0-20).
    /// Default: 2
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u32,

    /// How long a received message stays hidden from other receivers, in
    /// seconds. Unset uses the queue's own setting.
    #[serde(default)]
    pub visibility_timeout_secs: Option<u32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            queue_name: default_queue_name(),
            wait_time_secs: default_wait_time_secs(),
            visibility_timeout_secs: None,
        }
    }
}

impl QueueConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_time_secs > 20 {
            return Err(ConfigError::Validation(format!(
                "queue.wait_time_secs must be between 0 and 20, got {}",
                self.wait_time_secs
            )));
        }
        if self.backend == QueueBackend::Sqs && self.queue_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "queue.queue_name is required for the sqs backend".into(),
            ));
        }
        Ok(())
    }
}

fn default_queue_name() -> String {
    "delete-items".to_string()
}

fn default_wait_time_secs() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: QueueConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend, QueueBackend::Memory);
        assert_eq!(config.queue_name, "delete-items");
        assert_eq!(config.wait_time_secs, 2);
        assert!(config.visibility_timeout_secs.is_none());
    }

    #[test]
    fn test_rejects_long_wait() {
        let config: QueueConfig = toml::from_str("backend = \"sqs\"\nwait_time_secs = 30").unwrap();
        assert!(config.validate().is_err());
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// AWS connection settings shared by the DynamoDB store and the SQS queue.
///
/// ```toml
/// [aws]
/// region = "us-west-2"
/// endpoint_url = "http://localhost:4566"
/// access_key_id = "${AWS_ACCESS_KEY_ID}"
/// secret_access_key = "${AWS_SECRET_ACCESS_KEY}"
/// timeout_secs = 3
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// Region. Falls back to the SDK's default chain when unset.
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint, e.g. localstack.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Static credentials. Both must be set to take effect; otherwise the
    /// standard credential chain (environment, profile, instance role) is used.
    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub session_token: Option<String>,

    /// Per-operation timeout in seconds.
    /// Default: 3
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AwsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

fn default_timeout_secs() -> u64 {
    3
}

//! Shared AWS SDK configuration loading for the DynamoDB and SQS backends.

use aws_smithy_types::timeout::TimeoutConfig;

use crate::config::AwsConfig;

/// Build an SDK config from the `[aws]` section.
///
/// Region and credentials fall back to the SDK's default provider chains
/// when not set explicitly.
pub async fn load_sdk_config(config: &AwsConfig) -> aws_config::SdkConfig {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = &config.region {
        builder = builder.region(aws_config::Region::new(region.clone()));
    }

    if let (Some(access_key), Some(secret_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        let credentials = aws_credential_types::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            config.session_token.clone(),
            None, // expiry
            "content-purge-config",
        );
        builder = builder.credentials_provider(credentials);
    }

    builder = builder.timeout_config(
        TimeoutConfig::builder()
            .operation_timeout(config.timeout())
            .build(),
    );

    builder.load().await
}

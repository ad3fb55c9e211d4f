//! Amazon SQS delete queue.

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::{debug, error, instrument};

use super::{DeleteQueue, DeleteRequestMessage, QueueError, QueueResult, traits::encode_body};
use crate::config::{AwsConfig, QueueConfig};

pub struct SqsDeleteQueue {
    client: Client,
    queue_url: String,
    wait_time_secs: i32,
    visibility_timeout_secs: Option<i32>,
}

impl SqsDeleteQueue {
    /// Build a client and resolve the queue URL from its name.
    pub async fn new(aws: &AwsConfig, config: &QueueConfig) -> QueueResult<Self> {
        debug!(queue = %config.queue_name, region = ?aws.region, "Initializing SQS delete queue");

        let sdk_config = crate::aws::load_sdk_config(aws).await;

        let mut sqs_config = aws_sdk_sqs::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &aws.endpoint_url {
            sqs_config = sqs_config.endpoint_url(endpoint);
        }
        let client = Client::from_conf(sqs_config.build());

        let output = client
            .get_queue_url()
            .queue_name(&config.queue_name)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!(error = %message, queue = %config.queue_name, "Failed to resolve queue URL");
                QueueError::Transport(message)
            })?;

        let queue_url = output
            .queue_url()
            .ok_or_else(|| {
                QueueError::Transport(format!("No URL returned for queue '{}'", config.queue_name))
            })?
            .to_string();

        Ok(Self {
            client,
            queue_url,
            wait_time_secs: i32::try_from(config.wait_time_secs).unwrap_or(20),
            visibility_timeout_secs: config
                .visibility_timeout_secs
                .map(|secs| i32::try_from(secs).unwrap_or(i32::MAX)),
        })
    }
}

#[async_trait]
impl DeleteQueue for SqsDeleteQueue {
    #[instrument(skip(self), fields(queue_url = %self.queue_url))]
    async fn receive(&self) -> QueueResult<Option<DeleteRequestMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_secs)
            .set_visibility_timeout(self.visibility_timeout_secs)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!(error = %message, "Failed to receive message");
                QueueError::Transport(message)
            })?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };

        let body = message.body().unwrap_or_default();
        let request = DeleteRequestMessage::from_body(
            body,
            message.receipt_handle().map(str::to_string),
        )
        .inspect_err(|e| {
            error!(error = %e, message_id = ?message.message_id(), "Failed to decode message body");
        })?;

        Ok(Some(request))
    }

    #[instrument(skip(self), fields(queue_url = %self.queue_url))]
    async fn send(&self, account_id: &str) -> QueueResult<()> {
        let body = encode_body(account_id)?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!(error = %message, "Failed to send message");
                QueueError::Transport(message)
            })?;

        Ok(())
    }

    #[instrument(skip(self, receipt_handle), fields(queue_url = %self.queue_url))]
    async fn acknowledge(&self, receipt_handle: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!(error = %message, "Failed to delete message");
                QueueError::Transport(message)
            })?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqs"
    }
}

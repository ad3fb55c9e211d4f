use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::QueueResult;

/// JSON body of a delete request on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequestBody {
    pub account_id: String,
}

/// A delete request received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequestMessage {
    pub account_id: String,
    /// Opaque handle passed back to [`DeleteQueue::acknowledge`].
    pub receipt_handle: Option<String>,
}

impl DeleteRequestMessage {
    /// Decode a message body and attach its receipt handle.
    pub fn from_body(body: &str, receipt_handle: Option<String>) -> QueueResult<Self> {
        let body: DeleteRequestBody = serde_json::from_str(body)?;
        Ok(Self {
            account_id: body.account_id,
            receipt_handle,
        })
    }
}

/// Source of delete requests.
#[async_trait]
pub trait DeleteQueue: Send + Sync {
    /// Receive at most one message. Returns `None` when the poll came back
    /// empty. The message stays on the queue until acknowledged.
    async fn receive(&self) -> QueueResult<Option<DeleteRequestMessage>>;

    /// Enqueue a delete request for an account.
    async fn send(&self, account_id: &str) -> QueueResult<()>;

    /// Remove a processed message from the queue.
    async fn acknowledge(&self, receipt_handle: &str) -> QueueResult<()>;

    fn backend_name(&self) -> &'static str;
}

pub(crate) fn encode_body(account_id: &str) -> QueueResult<String> {
    Ok(serde_json::to_string(&DeleteRequestBody {
        account_id: account_id.to_string(),
    })?)
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue was unreachable or returned a malformed response.
    #[error("Queue transport error: {0}")]
    Transport(String),

    /// A message body was not a valid delete request.
    #[error("Invalid message body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Queue backend not available: {0}")]
    NotConfigured(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

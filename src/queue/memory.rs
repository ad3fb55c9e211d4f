//! In-memory delete queue.
//!
//! Received messages move to an in-flight table keyed by receipt handle and
//! are only dropped on acknowledgement. [`MemoryDeleteQueue::requeue_in_flight`]
//! stands in for a visibility timeout expiring.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{DeleteQueue, DeleteRequestMessage, QueueResult, traits::encode_body};

#[derive(Debug, Default)]
pub struct MemoryDeleteQueue {
    ready: Mutex<VecDeque<String>>,
    in_flight: DashMap<String, String>,
}

impl MemoryDeleteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting to be received.
    pub fn pending(&self) -> usize {
        self.ready.lock().len()
    }

    /// Messages received but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Return every unacknowledged message to the front of the queue.
    pub fn requeue_in_flight(&self) {
        let bodies: Vec<String> = self
            .in_flight
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.in_flight.clear();

        let mut ready = self.ready.lock();
        for body in bodies.into_iter().rev() {
            ready.push_front(body);
        }
    }
}

#[async_trait]
impl DeleteQueue for MemoryDeleteQueue {
    async fn receive(&self) -> QueueResult<Option<DeleteRequestMessage>> {
        let Some(body) = self.ready.lock().pop_front() else {
            return Ok(None);
        };

        let receipt = Uuid::new_v4().to_string();
        let message = match DeleteRequestMessage::from_body(&body, Some(receipt.clone())) {
            Ok(message) => message,
            Err(e) => {
                // Keep the poison message in flight so it is not redelivered
                // in a tight loop.
                self.in_flight.insert(receipt, body);
                return Err(e);
            }
        };
        self.in_flight.insert(receipt, body);
        Ok(Some(message))
    }

    async fn send(&self, account_id: &str) -> QueueResult<()> {
        let body = encode_body(account_id)?;
        self.ready.lock().push_back(body);
        Ok(())
    }

    async fn acknowledge(&self, receipt_handle: &str) -> QueueResult<()> {
        // Unknown handles are ignored, matching the service's behavior for
        // already-deleted messages.
        self.in_flight.remove(receipt_handle);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryDeleteQueue {
    /// Push a raw body, bypassing encoding. Test helper for malformed input.
    #[cfg(test)]
    pub(crate) fn push_raw(&self, body: &str) {
        self.ready.lock().push_back(body.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueError;

    #[tokio::test]
    async fn test_send_receive_acknowledge() {
        let queue = MemoryDeleteQueue::new();
        queue.send("a1").await.unwrap();
        queue.send("a2").await.unwrap();
        assert_eq!(queue.pending(), 2);

        let first = queue.receive().await.unwrap().unwrap();
        assert_eq!(first.account_id, "a1");
        assert_eq!(queue.in_flight(), 1);

        queue
            .acknowledge(first.receipt_handle.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(queue.in_flight(), 0);

        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(second.account_id, "a2");
        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unacknowledged_message_is_redelivered() {
        let queue = MemoryDeleteQueue::new();
        queue.send("a1").await.unwrap();

        let first = queue.receive().await.unwrap().unwrap();
        assert!(queue.receive().await.unwrap().is_none());

        queue.requeue_in_flight();
        let again = queue.receive().await.unwrap().unwrap();
        assert_eq!(again.account_id, "a1");
        assert_ne!(again.receipt_handle, first.receipt_handle);
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let queue = MemoryDeleteQueue::new();
        queue.push_raw("{broken");

        let err = queue.receive().await.unwrap_err();
        assert!(matches!(err, QueueError::Decode(_)));
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.in_flight(), 1);
    }
}

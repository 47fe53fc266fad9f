//! Redis-backed work queue.
//!
//! A single Redis list acts as the global FIFO between producers (trigger
//! poller, recurrence engine) and the executor. Messages are pushed to the
//! left (LPUSH) and popped from the right (RPOP) so they come off in
//! arrival order.
//!
//! # Delivery contract
//!
//! - `enqueue` never drops on a success return; `dequeue` removes the head
//!   or returns `None` without blocking (the executor's loop supplies the
//!   wait).
//! - There is no visibility timeout and no processing list: once a message
//!   is popped it is gone from the queue regardless of whether processing
//!   finishes. A crash between pop and outcome recording loses that
//!   occurrence, which is the accepted at-least-once trade-off of this
//!   transport.
//! - FIFO ordering holds across the single global list only; there is no
//!   per-owner ordering guarantee.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;

use super::job::QueueMessage;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Failed to connect to Redis.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis operation failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The hand-off point between producers and the executor.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Appends a message to the tail of the queue.
    async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Removes and returns the head message, or `None` when the queue is
    /// empty. Never blocks.
    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError>;

    /// Returns the number of messages waiting on the queue.
    async fn len(&self) -> Result<usize, QueueError>;
}

/// Redis implementation of [`WorkQueue`] over one named list.
pub struct RedisQueue {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
    /// Name of the list holding pending messages.
    queue_name: String,
}

impl RedisQueue {
    /// Connects to Redis and creates a new queue.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `queue_name` - Name of the list used as the queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            redis,
            queue_name: queue_name.to_string(),
        })
    }

    /// Creates a queue from an existing ConnectionManager.
    ///
    /// Useful when sharing a connection across multiple components.
    pub fn from_connection(redis: ConnectionManager, queue_name: &str) -> Self {
        Self {
            redis,
            queue_name: queue_name.to_string(),
        }
    }

    /// Returns the queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let serialized = serde_json::to_string(message)?;
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(&self.queue_name, serialized).await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError> {
        let mut conn = self.redis.clone();
        let data: Option<String> = conn.rpop(&self.queue_name, None).await?;

        match data {
            Some(raw) => {
                let message: QueueMessage = serde_json::from_str(&raw)?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.queue_name).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::{CallRequest, MessagePayload};

    #[test]
    fn test_queue_error_display() {
        let err = QueueError::ConnectionFailed("timeout".to_string());
        assert!(err.to_string().contains("timeout"));

        let err = QueueError::Serialization(
            serde_json::from_str::<QueueMessage>("not json").unwrap_err(),
        );
        assert!(err.to_string().contains("Serialization"));
    }

    #[test]
    fn test_message_roundtrip_through_wire_format() {
        let message = QueueMessage::immediate(CallRequest {
            phone_number: "+15551234567".to_string(),
            message: Some("hello".to_string()),
            language: "en".to_string(),
            platform: None,
            user_id: 3,
        });

        let raw = serde_json::to_string(&message).expect("serialization should work");
        let parsed: QueueMessage = serde_json::from_str(&raw).expect("deserialization should work");

        assert_eq!(parsed.id, message.id);
        match parsed.payload {
            MessagePayload::Immediate(request) => {
                assert_eq!(request.phone_number, "+15551234567");
                assert_eq!(request.user_id, 3);
            }
            MessagePayload::Scheduled(_) => panic!("expected immediate payload"),
        }
    }
}

//! Ordered message queue collaborators.
//!
//! Modelled on FIFO queues with message groups: delivery is at-least-once,
//! ordered within a group, and a received message stays invisible to other
//! consumers until its visibility timeout lapses or it is deleted.

pub mod file;
pub mod memory;

pub use file::FileQueue;
pub use memory::MemoryQueue;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    /// Stable id assigned on send.
    pub message_id: String,
    /// Handle for this delivery; required to delete the message.
    pub receipt_handle: String,
    /// Message group the message was sent to.
    pub group_id: String,
    /// Raw message body.
    pub body: String,
    /// How many times the message has been delivered, including this one.
    pub receive_count: u32,
}

/// Group-ordered, at-least-once message queue.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append `body` to `group_id`, returning the new message id.
    async fn send(&self, body: String, group_id: &str) -> Result<String>;

    /// Receive up to `max_messages` visible messages.
    ///
    /// Returned messages are hidden for `visibility_timeout`. With a zero
    /// `wait_time` the call returns immediately, possibly with nothing.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>>;

    /// Delete the message delivered with `receipt_handle`.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

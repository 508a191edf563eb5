//! In-process FIFO queue with message groups and visibility timeouts.

use super::{MessageQueue, ReceivedMessage};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

/// Poll interval while waiting for messages.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A message at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    id: String,
    group_id: String,
    body: String,
    #[serde(default)]
    receipt_handle: Option<String>,
    #[serde(default)]
    invisible_until_ms: Option<i64>,
    #[serde(default)]
    receive_count: u32,
}

impl StoredMessage {
    fn in_flight(&self, now_ms: i64) -> bool {
        self.invisible_until_ms.is_some_and(|until| until > now_ms)
    }
}

/// Queue contents, shared by the in-memory and file-backed queues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct QueueState {
    #[serde(default)]
    messages: VecDeque<StoredMessage>,
}

impl QueueState {
    pub(crate) fn send(&mut self, body: String, group_id: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.messages.push_back(StoredMessage {
            id: id.clone(),
            group_id: group_id.to_owned(),
            body,
            receipt_handle: None,
            invisible_until_ms: None,
            receive_count: 0,
        });
        id
    }

    /// Deliver visible messages in send order.
    ///
    /// A group with a message in flight delivers nothing else until that
    /// message is deleted or becomes visible again.
    pub(crate) fn receive_at(
        &mut self,
        now_ms: i64,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Vec<ReceivedMessage> {
        let blocked: HashSet<String> = self
            .messages
            .iter()
            .filter(|m| m.in_flight(now_ms))
            .map(|m| m.group_id.clone())
            .collect();
        let visibility_ms = i64::try_from(visibility_timeout.as_millis()).unwrap_or(i64::MAX);

        let mut delivered = Vec::new();
        for message in self.messages.iter_mut() {
            if delivered.len() >= max_messages {
                break;
            }
            if blocked.contains(&message.group_id) {
                continue;
            }
            let handle = uuid::Uuid::new_v4().to_string();
            message.receipt_handle = Some(handle.clone());
            message.invisible_until_ms = Some(now_ms.saturating_add(visibility_ms));
            message.receive_count += 1;
            delivered.push(ReceivedMessage {
                message_id: message.id.clone(),
                receipt_handle: handle,
                group_id: message.group_id.clone(),
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
        }
        delivered
    }

    pub(crate) fn delete(&mut self, receipt_handle: &str) -> Result<()> {
        let position = self
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| {
                PipelineError::Queue(format!("receipt handle {receipt_handle} is not valid"))
            })?;
        self.messages.remove(position);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn in_flight(&self, now_ms: i64) -> usize {
        self.messages.iter().filter(|m| m.in_flight(now_ms)).count()
    }
}

pub(crate) fn now_epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Queue held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages not yet deleted, including in-flight ones.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// `true` when every message has been deleted.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Messages currently hidden by a visibility timeout.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight(now_epoch_millis())
    }

    /// Bodies of all stored messages, in send order.
    pub async fn bodies(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .map(|m| m.body.clone())
            .collect()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, body: String, group_id: &str) -> Result<String> {
        Ok(self.state.lock().await.send(body, group_id))
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        let deadline = tokio::time::Instant::now() + wait_time;
        loop {
            let delivered = self.state.lock().await.receive_at(
                now_epoch_millis(),
                max_messages,
                visibility_timeout,
            );
            if !delivered.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(delivered);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.state.lock().await.delete(receipt_handle)
    }
}

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::StoreResult;

/// Who a message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTaskTarget {
    pub cluster_id: i64,
    pub node_id: i64,
    pub server_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MessageType {
    FirewallEvent,
}

/// A recorded message awaiting delivery to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTask {
    pub id: i64,
    pub target: MessageTaskTarget,
    pub message_type: MessageType,
    pub subject: String,
    pub body: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Destination for operator messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Record a task. Returns its id.
    async fn create_message_task(
        &self,
        target: MessageTaskTarget,
        message_type: MessageType,
        subject: &str,
        body: &str,
    ) -> StoreResult<i64>;

    /// Recorded tasks, oldest first.
    async fn list_message_tasks(&self) -> StoreResult<Vec<MessageTask>>;
}

/// In-memory [`MessageSink`].
pub struct MemoryMessageSink {
    tasks: Mutex<Vec<MessageTask>>,
    next_id: AtomicI64,
}

impl Default for MemoryMessageSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMessageSink {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl MessageSink for MemoryMessageSink {
    async fn create_message_task(
        &self,
        target: MessageTaskTarget,
        message_type: MessageType,
        subject: &str,
        body: &str,
    ) -> StoreResult<i64> {
        let task = MessageTask {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            target,
            message_type,
            subject: subject.to_string(),
            body: body.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        let id = task.id;
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).push(task);
        Ok(id)
    }

    async fn list_message_tasks(&self) -> StoreResult<Vec<MessageTask>> {
        Ok(self.tasks.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

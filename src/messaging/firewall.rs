//! Firewall event notification.

use std::sync::Arc;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{require_id, EdgeResult};
use crate::messaging::sink::{MessageSink, MessageTaskTarget, MessageType};
use crate::store::EntityStore;

const SUBJECT: &str = "Firewall event";

/// A firewall rule hit reported by an edge node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpFirewallEvent {
    pub server_id: i64,
    #[serde(default)]
    pub rule_group: String,
    #[serde(default)]
    pub rule_set: String,
    /// Unix seconds at which the node saw the event.
    pub created_at: i64,
}

/// Turns node firewall reports into operator messages.
#[derive(Clone)]
pub struct FirewallNotifier {
    store: Arc<dyn EntityStore>,
    sink: Arc<dyn MessageSink>,
}

impl FirewallNotifier {
    pub fn new(store: Arc<dyn EntityStore>, sink: Arc<dyn MessageSink>) -> Self {
        Self { store, sink }
    }

    /// Record a message for `event`. Returns the task id, or `None` when the
    /// node belongs to no cluster.
    pub async fn notify_http_firewall_event(&self, node_id: i64, event: &HttpFirewallEvent) -> EdgeResult<Option<i64>> {
        require_id("node_id", node_id)?;

        let Some(node) = self.store.find_node(node_id).await? else {
            return Ok(None);
        };
        if node.cluster_id <= 0 {
            return Ok(None);
        }

        let cluster_name = self
            .store
            .find_cluster(node.cluster_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();
        let server_name = self
            .store
            .find_server(event.server_id)
            .await?
            .filter(|s| s.state.is_enabled())
            .map(|s| s.name)
            .unwrap_or_default();

        let body = format!(
            "Cluster: {} (ID: {})\nNode: {} (ID: {})\nServer: {} (ID: {})\nRule group: {}\nRule set: {}\nTime: {}",
            cluster_name,
            node.cluster_id,
            node.name,
            node.id,
            server_name,
            event.server_id,
            event.rule_group,
            event.rule_set,
            format_time(event.created_at),
        );

        let target = MessageTaskTarget {
            cluster_id: node.cluster_id,
            node_id: node.id,
            server_id: event.server_id,
        };
        let task_id = self
            .sink
            .create_message_task(target, MessageType::FirewallEvent, SUBJECT, &body)
            .await?;

        tracing::info!(
            task_id,
            cluster_id = target.cluster_id,
            node_id = target.node_id,
            server_id = target.server_id,
            "Firewall event recorded"
        );
        Ok(Some(task_id))
    }
}

fn format_time(unix_secs: i64) -> String {
    match DateTime::from_timestamp(unix_secs, 0) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => unix_secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MemoryMessageSink;
    use crate::model::{Cluster, Node, Server};
    use crate::store::MemoryStore;

    fn event() -> HttpFirewallEvent {
        HttpFirewallEvent {
            server_id: 20,
            rule_group: "SQL injection".into(),
            rule_set: "union select".into(),
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_event_creates_addressed_task() {
        let store = Arc::new(MemoryStore::new());
        store
            .save_cluster(Cluster {
                id: 1,
                name: "edge-eu".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .save_node(Node {
                id: 10,
                cluster_id: 1,
                name: "node-a".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .save_server(Server {
                id: 20,
                cluster_id: 1,
                name: "shop".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let sink = Arc::new(MemoryMessageSink::new());
        let notifier = FirewallNotifier::new(store, sink.clone());

        let id = notifier.notify_http_firewall_event(10, &event()).await.unwrap();
        assert!(id.is_some());

        let tasks = sink.list_message_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.message_type, MessageType::FirewallEvent);
        assert_eq!(
            task.target,
            MessageTaskTarget {
                cluster_id: 1,
                node_id: 10,
                server_id: 20
            }
        );
        assert!(task.body.contains("Cluster: edge-eu (ID: 1)"));
        assert!(task.body.contains("Server: shop (ID: 20)"));
        assert!(task.body.contains("Rule set: union select"));
        assert!(task.body.contains("Time: 2023-11-14 22:13:20"));
    }

    #[tokio::test]
    async fn test_node_without_cluster_is_silent() {
        let store = Arc::new(MemoryStore::new());
        store
            .save_node(Node {
                id: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        let sink = Arc::new(MemoryMessageSink::new());
        let notifier = FirewallNotifier::new(store, sink.clone());

        assert_eq!(notifier.notify_http_firewall_event(10, &event()).await.unwrap(), None);
        assert_eq!(notifier.notify_http_firewall_event(99, &event()).await.unwrap(), None);
        assert!(sink.list_message_tasks().await.unwrap().is_empty());
    }
}

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-bus** – the cluster message bus abstraction: per-node
//! publish/subscribe topics carrying JSONx-encoded RPC envelopes
//! (spec §4.I, §6 "Cluster bus").

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use schemat_types::{NodeId, WorkerId};

/// A publish/subscribe bus with one topic per cluster node.
///
/// Real deployments back this with a Kafka topic per node (spec §6);
/// this crate only defines the seam and an in-memory implementation
/// for single-process tests and bootstrapping.
pub trait MessageBus: Send + Sync {
    /// Publish `message` onto `node`'s topic. Should not block; slow or
    /// absent subscribers may miss the message.
    fn publish(&self, node: &NodeId, message: serde_json::Value) -> Result<(), BusError>;

    /// Subscribe to `node`'s topic, receiving every message published
    /// after this call.
    fn subscribe(&self, node: &NodeId) -> broadcast::Receiver<serde_json::Value>;
}

/// Errors raised by a [`MessageBus`] implementation.
#[derive(Debug, Error)]
pub enum BusError {
    /// The message could not be published.
    #[error("failed to publish to node {0}: {1}")]
    PublishFailed(NodeId, String),
}

/// The client id a worker process identifies itself with on the bus
/// (spec §6: `"node-<nodeId>-worker-<workerId>"`).
pub fn client_id(node: &NodeId, worker: WorkerId) -> String {
    format!("node-{}-worker-{}", node.0, worker.0)
}

/// In-memory, single-process bus: one `broadcast` channel per node,
/// created lazily on first publish or subscribe.
#[derive(Clone)]
pub struct InMemoryBus {
    capacity: usize,
    topics: Arc<DashMap<NodeId, broadcast::Sender<serde_json::Value>>>,
}

impl InMemoryBus {
    /// A bus whose per-node topics buffer up to `capacity` messages for
    /// subscribers that fall behind.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, topics: Arc::new(DashMap::new()) }
    }

    /// Number of subscribers currently attached to `node`'s topic.
    pub fn subscriber_count(&self, node: &NodeId) -> usize {
        self.topics.get(node).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    fn topic(&self, node: &NodeId) -> broadcast::Sender<serde_json::Value> {
        self.topics
            .entry(node.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, node: &NodeId, message: serde_json::Value) -> Result<(), BusError> {
        let tx = self.topic(node);
        // A lagging or absent receiver is not a publish failure — the
        // bus guarantees delivery to current subscribers only.
        let _ = tx.send(message);
        debug!(node = %node, "message published");
        Ok(())
    }

    fn subscribe(&self, node: &NodeId) -> broadcast::Receiver<serde_json::Value> {
        self.topic(node).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node(name: &str) -> NodeId {
        NodeId(name.to_string())
    }

    #[test]
    fn client_id_matches_the_spec_format() {
        assert_eq!(client_id(&node("alpha"), WorkerId(3)), "node-alpha-worker-3");
    }

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let bus = InMemoryBus::new(16);
        let mut rx = bus.subscribe(&node("alpha"));

        let envelope = json!({"target": 100, "role": "scheduler", "method": "ping"});
        bus.publish(&node("alpha"), envelope.clone()).unwrap();

        assert_eq!(rx.recv().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn topics_are_isolated_per_node() {
        let bus = InMemoryBus::new(16);
        let mut rx_alpha = bus.subscribe(&node("alpha"));
        let mut rx_beta = bus.subscribe(&node("beta"));

        bus.publish(&node("alpha"), json!("for-alpha")).unwrap();

        assert_eq!(rx_alpha.recv().await.unwrap(), json!("for-alpha"));
        assert!(rx_beta.try_recv().is_err());
    }

    #[test]
    fn subscriber_count_reflects_active_subscriptions() {
        let bus = InMemoryBus::new(16);
        assert_eq!(bus.subscriber_count(&node("alpha")), 0);
        let _rx1 = bus.subscribe(&node("alpha"));
        let _rx2 = bus.subscribe(&node("alpha"));
        assert_eq!(bus.subscriber_count(&node("alpha")), 2);
    }
}

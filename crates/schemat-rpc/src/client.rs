//! Dispatches `$role.method()` calls in-process when the target agent
//! is resident, or over the cluster bus otherwise (spec §4.I).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use schemat_bus::MessageBus;
use schemat_object::RoleHandle;
use schemat_types::NodeId;

use crate::dispatch::{LocalDispatcher, NodeLocator, ResidencyCheck};
use crate::envelope::RpcEnvelope;
use crate::error::{RpcError, RpcResult};

type PendingReplies = DashMap<Uuid, oneshot::Sender<RpcResult<serde_json::Value>>>;

/// The proxy a `$role` access synthesizes into: routes a call in-process
/// or over the bus and, for remote calls, correlates the eventual
/// reply back to the awaiting caller.
pub struct RpcClient {
    bus: Arc<dyn MessageBus>,
    residency: Arc<dyn ResidencyCheck>,
    locator: Arc<dyn NodeLocator>,
    dispatcher: Arc<dyn LocalDispatcher>,
    self_node: NodeId,
    pending: Arc<PendingReplies>,
    request_timeout: Duration,
}

impl RpcClient {
    /// A client listening on `self_node`'s bus topic, resolving
    /// residency via `residency`, target nodes via `locator`, and local
    /// calls via `dispatcher`.
    pub fn new(
        bus: impl MessageBus + 'static,
        residency: impl ResidencyCheck + 'static,
        locator: impl NodeLocator + 'static,
        dispatcher: impl LocalDispatcher + 'static,
        self_node: NodeId,
        request_timeout: Duration,
    ) -> Self {
        Self {
            bus: Arc::new(bus),
            residency: Arc::new(residency),
            locator: Arc::new(locator),
            dispatcher: Arc::new(dispatcher),
            self_node,
            pending: Arc::new(DashMap::new()),
            request_timeout,
        }
    }

    /// Number of replies this client is still waiting on.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Invoke `method(args)` on `handle`, in-process if the target is
    /// resident here, otherwise over the bus with a correlated reply
    /// awaited up to `request_timeout`.
    pub async fn call(&self, handle: RoleHandle, method: &str, args: serde_json::Value) -> RpcResult<serde_json::Value> {
        if self.residency.is_resident(handle.target) {
            return self.dispatcher.dispatch(handle.target, &handle.role, method, args).await;
        }

        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id, tx);

        let envelope = RpcEnvelope::Request {
            correlation_id,
            target: handle.target,
            role: handle.role,
            method: method.to_string(),
            args,
            reply_to: self.self_node.clone(),
        };
        let payload = serde_json::to_value(&envelope)
            .map_err(|err| RpcError::RemoteError(err.to_string()))?;

        let node = self.locator.node_for(handle.target);
        if let Err(err) = self.bus.publish(&node, payload) {
            self.pending.remove(&correlation_id);
            return Err(RpcError::PublishFailed(err.to_string()));
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(_) => {
                self.pending.remove(&correlation_id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Subscribe to `self_node`'s bus topic and process incoming
    /// envelopes until the topic closes: replies complete the matching
    /// pending call, requests addressed to a locally resident target are
    /// dispatched and answered.
    pub fn spawn_reply_listener(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut rx = this.bus.subscribe(&this.self_node);
            loop {
                match rx.recv().await {
                    Ok(value) => {
                        let this = this.clone();
                        tokio::spawn(async move { this.handle_incoming(value).await });
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "rpc listener lagged behind its bus topic");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn handle_incoming(self: Arc<Self>, value: serde_json::Value) {
        let Ok(envelope) = serde_json::from_value::<RpcEnvelope>(value) else {
            return;
        };
        match envelope {
            RpcEnvelope::Reply { correlation_id, result } => {
                if let Some((_, tx)) = self.pending.remove(&correlation_id) {
                    let _ = tx.send(result.map_err(RpcError::RemoteError));
                }
            }
            RpcEnvelope::Request { correlation_id, target, role, method, args, reply_to } => {
                if !self.residency.is_resident(target) {
                    return; // addressed to a sibling worker sharing this node's topic
                }
                let outcome = self.dispatcher.dispatch(target, &role, &method, args).await;
                let reply = RpcEnvelope::Reply { correlation_id, result: outcome.map_err(|e| e.to_string()) };
                if let Ok(payload) = serde_json::to_value(&reply) {
                    let _ = self.bus.publish(&reply_to, payload);
                }
            }
        }
    }
}

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-rpc** – the role-based RPC proxy layer: resolves
//! `obj.$role.method(args)` to an in-process call or a cluster-bus
//! round trip (spec §4.I).

mod client;
mod dispatch;
mod envelope;
mod error;

pub use client::RpcClient;
pub use dispatch::{LocalDispatcher, NodeLocator, ResidencyCheck};
pub use envelope::RpcEnvelope;
pub use error::{RpcError, RpcResult};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use schemat_bus::{InMemoryBus, MessageBus};
    use schemat_object::parse_role;
    use schemat_types::{NodeId, ObjectId};
    use serde_json::json;

    use super::*;

    struct AlwaysResident(bool);
    impl ResidencyCheck for AlwaysResident {
        fn is_resident(&self, _target: ObjectId) -> bool {
            self.0
        }
    }

    struct FlagResident(Arc<AtomicBool>);
    impl ResidencyCheck for FlagResident {
        fn is_resident(&self, _target: ObjectId) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct FixedNode(NodeId);
    impl NodeLocator for FixedNode {
        fn node_for(&self, _target: ObjectId) -> NodeId {
            self.0.clone()
        }
    }

    struct EchoDispatcher;
    #[async_trait::async_trait]
    impl LocalDispatcher for EchoDispatcher {
        async fn dispatch(
            &self,
            _target: ObjectId,
            _role: &str,
            method: &str,
            args: serde_json::Value,
        ) -> Result<serde_json::Value, RpcError> {
            if method == "boom" {
                return Err(RpcError::MethodNotFound { role: "worker".into(), method: method.into() });
            }
            Ok(json!({"echoed": args, "method": method}))
        }
    }

    struct NeverDispatcher;
    #[async_trait::async_trait]
    impl LocalDispatcher for NeverDispatcher {
        async fn dispatch(
            &self,
            _target: ObjectId,
            _role: &str,
            _method: &str,
            _args: serde_json::Value,
        ) -> Result<serde_json::Value, RpcError> {
            panic!("should never be reached by this test")
        }
    }

    #[tokio::test]
    async fn local_dispatch_skips_the_bus_entirely() {
        let client = RpcClient::new(
            InMemoryBus::new(16),
            AlwaysResident(true),
            FixedNode(NodeId("unused".into())),
            EchoDispatcher,
            NodeId("alpha".into()),
            Duration::from_millis(200),
        );

        let handle = parse_role(ObjectId(42), "$worker").unwrap();
        let reply = client.call(handle, "ping", json!({"n": 1})).await.unwrap();
        assert_eq!(reply, json!({"echoed": {"n": 1}, "method": "ping"}));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn local_dispatch_surfaces_method_not_found_untranslated() {
        let client = RpcClient::new(
            InMemoryBus::new(16),
            AlwaysResident(true),
            FixedNode(NodeId("unused".into())),
            EchoDispatcher,
            NodeId("alpha".into()),
            Duration::from_millis(200),
        );

        let handle = parse_role(ObjectId(42), "$worker").unwrap();
        let err = client.call(handle, "boom", json!(null)).await.unwrap_err();
        assert_eq!(err, RpcError::MethodNotFound { role: "worker".into(), method: "boom".into() });
    }

    #[tokio::test]
    async fn remote_call_round_trips_over_the_bus() {
        let bus = InMemoryBus::new(16);
        let caller_node = NodeId("alpha".into());
        let callee_node = NodeId("beta".into());

        let caller = Arc::new(RpcClient::new(
            bus.clone(),
            AlwaysResident(false),
            FixedNode(callee_node.clone()),
            NeverDispatcher,
            caller_node.clone(),
            Duration::from_millis(500),
        ));
        caller.spawn_reply_listener();

        let callee = Arc::new(RpcClient::new(
            bus.clone(),
            AlwaysResident(true),
            FixedNode(caller_node.clone()),
            EchoDispatcher,
            callee_node,
            Duration::from_millis(500),
        ));
        callee.spawn_reply_listener();

        let handle = parse_role(ObjectId(7), "$worker").unwrap();
        let reply = caller.call(handle, "ping", json!({"n": 2})).await.unwrap();
        assert_eq!(reply, json!({"echoed": {"n": 2}, "method": "ping"}));
    }

    #[tokio::test]
    async fn remote_call_times_out_when_nobody_answers() {
        let bus = InMemoryBus::new(16);
        let caller = RpcClient::new(
            bus,
            AlwaysResident(false),
            FixedNode(NodeId("nowhere".into())),
            NeverDispatcher,
            NodeId("alpha".into()),
            Duration::from_millis(30),
        );

        let handle = parse_role(ObjectId(9), "$worker").unwrap();
        let err = caller.call(handle, "ping", json!(null)).await.unwrap_err();
        assert_eq!(err, RpcError::Timeout);
        assert_eq!(caller.pending_count(), 0);
    }

    #[tokio::test]
    async fn a_reply_with_an_unknown_correlation_id_is_ignored() {
        let bus = InMemoryBus::new(16);
        let node = NodeId("alpha".into());
        let client = Arc::new(RpcClient::new(
            bus.clone(),
            FlagResident(Arc::new(AtomicBool::new(false))),
            FixedNode(NodeId("nowhere".into())),
            NeverDispatcher,
            node.clone(),
            Duration::from_millis(200),
        ));
        client.spawn_reply_listener();

        let stray = RpcEnvelope::Reply { correlation_id: uuid::Uuid::new_v4(), result: Ok(json!("hi")) };
        bus.publish(&node, serde_json::to_value(&stray).unwrap()).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(client.pending_count(), 0);
    }
}

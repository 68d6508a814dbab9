//! Seams the proxy layer is built against: resolving where an agent
//! lives, and invoking a role method on one that lives here.

use schemat_types::{NodeId, ObjectId};

use crate::error::RpcError;

/// Whether `target` is a locally running agent (spec §4.I: "if the
/// agent runs locally, the scheduler has it in state").
pub trait ResidencyCheck: Send + Sync {
    /// True if `target` is currently resident in this process.
    fn is_resident(&self, target: ObjectId) -> bool;
}

/// Maps an object id to the cluster node it is expected to be running
/// on, so a non-resident call knows which bus topic to publish to.
pub trait NodeLocator: Send + Sync {
    /// The node `target` is expected to run on.
    fn node_for(&self, target: ObjectId) -> NodeId;
}

/// Invokes `role.method(args)` on a locally resident agent.
///
/// A real deployment resolves this through the loaded instance's class
/// (same seam shape as [`schemat_object::ObjectClass::invoke_getter`]);
/// this crate only depends on the contract.
#[async_trait::async_trait]
pub trait LocalDispatcher: Send + Sync {
    /// Dispatch `method` on `target`'s `role`, returning its result.
    async fn dispatch(
        &self,
        target: ObjectId,
        role: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError>;
}

//! The agent lifecycle contract (spec §4.H): `__install__`, `__start__`,
//! `__stop__`, `__restart__`, `__uninstall__`.

use schemat_object::WebObject;
use schemat_types::ObjectId;

/// Per-class lifecycle hooks for an agent object. A real deployment
/// resolves these from the object's category (the method lookup lives in
/// the runtime's class registry); this crate only depends on the
/// contract, not on how an implementation is found.
pub trait AgentHooks: Send + Sync {
    /// Called once, before an agent's first `start`.
    fn install(&self, agent: &WebObject) {
        let _ = agent;
    }

    /// Start the agent, returning the opaque state it wants carried
    /// across restarts.
    fn start(&self, agent: &WebObject) -> serde_json::Value;

    /// Stop a running agent given the state it last reported.
    fn stop(&self, agent: &WebObject, state: &serde_json::Value);

    /// Restart an agent whose underlying object instance has been
    /// replaced (spec §4.H: "if instance replaced"). `prev` is the
    /// instance that was running before the replacement.
    fn restart(
        &self,
        agent: &WebObject,
        state: &serde_json::Value,
        prev: &WebObject,
    ) -> serde_json::Value;

    /// Called once an agent leaves the installed set for good.
    fn uninstall(&self, agent: &WebObject) {
        let _ = agent;
    }
}

/// Resolves the [`AgentHooks`] implementation for a given agent id.
///
/// Kept as a seam rather than a concrete lookup because resolving a
/// classpath to Rust code is the runtime's job, not the scheduler's.
pub trait AgentSource: Send + Sync {
    /// Hooks for `agent`. Called afresh on every lifecycle transition, so
    /// implementations should be cheap (a map lookup, typically).
    fn hooks_for(&self, agent: ObjectId) -> std::sync::Arc<dyn AgentHooks>;
}

/// Resolves which agents a node wants running right now.
///
/// Wraps the Node agent's `agents_running` / `master_agents_running`
/// fields (spec §4.H) behind a trait so the scheduler does not need to
/// know how the node object itself is loaded or re-read.
#[async_trait::async_trait]
pub trait DesiredSetSource: Send + Sync {
    /// Agents this worker should be running right now.
    async fn desired_agents(&self, worker: schemat_types::WorkerId) -> Vec<ObjectId>;

    /// Agents that should be installed right now, independent of whether
    /// they are currently running. Wraps the Node agent's
    /// `agents_installed` field (spec §4.H). Defaults to empty, so a
    /// source that never installs anything (tests, single-agent-class
    /// bootstraps) needs no override.
    async fn installed_agents(&self, _worker: schemat_types::WorkerId) -> Vec<ObjectId> {
        Vec::new()
    }
}

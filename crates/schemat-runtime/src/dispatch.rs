//! Adapters wiring `schemat-registry`, `schemat-scheduler`, and
//! `schemat-rpc`'s seams to one shared [`schemat_registry::Registry`]
//! (spec §4.E/§4.H/§4.I).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use schemat_object::{ObjectClass, RoleHandle};
use schemat_registry::Registry;
use schemat_rpc::{LocalDispatcher, NodeLocator, ResidencyCheck, RpcError};
use schemat_scheduler::{AgentSource, DesiredSetSource, Scheduler};
use schemat_types::{NodeId, ObjectId, WorkerId};

/// Resolves an object's `__category` reference to the [`ObjectClass`]
/// that governs it. A real deployment derives this from the category's
/// own stored classpath; this crate only depends on the seam (spec §9
/// "explicit `Runtime` handle instead of globals" — registrations are
/// held here, not behind a package-level static).
pub trait ClassResolver: Send + Sync {
    /// The class governing instances of `category`, if registered.
    fn resolve(&self, category: ObjectId) -> Option<Arc<dyn ObjectClass>>;
}

/// A [`ClassResolver`] backed by an explicit category-id -> class map,
/// populated once at boot.
#[derive(Default)]
pub struct StaticClassResolver {
    classes: DashMap<ObjectId, Arc<dyn ObjectClass>>,
}

impl StaticClassResolver {
    /// An empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class` as the governor of `category`.
    pub fn register(&self, category: ObjectId, class: Arc<dyn ObjectClass>) {
        self.classes.insert(category, class);
    }
}

impl ClassResolver for StaticClassResolver {
    fn resolve(&self, category: ObjectId) -> Option<Arc<dyn ObjectClass>> {
        self.classes.get(&category).map(|e| e.clone())
    }
}

/// A `(role, method)` handler, installed by a class at boot and invoked
/// by an incoming RPC request (spec §4.I: "resolves `obj.$role.method`
/// to... a cluster-bus round trip").
pub type RoleHandler = Arc<dyn Fn(Arc<std::sync::RwLock<schemat_object::WebObject>>, serde_json::Value) -> Result<serde_json::Value, RpcError> + Send + Sync>;

/// Maps `(role, method)` pairs to the handler that implements them.
#[derive(Default)]
pub struct RoleRegistry {
    handlers: DashMap<(String, String), RoleHandler>,
}

impl RoleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `role.method`.
    pub fn register(&self, role: impl Into<String>, method: impl Into<String>, handler: RoleHandler) {
        self.handlers.insert((role.into(), method.into()), handler);
    }
}

/// A [`LocalDispatcher`] that loads the target object from a
/// [`Registry`] and looks up its handler in a [`RoleRegistry`].
pub struct RegistryDispatcher {
    registry: Registry,
    roles: Arc<RoleRegistry>,
}

impl RegistryDispatcher {
    /// A dispatcher resolving targets through `registry` and handlers
    /// through `roles`.
    pub fn new(registry: Registry, roles: Arc<RoleRegistry>) -> Self {
        Self { registry, roles }
    }
}

#[async_trait]
impl LocalDispatcher for RegistryDispatcher {
    async fn dispatch(
        &self,
        target: ObjectId,
        role: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let key = (role.to_string(), method.to_string());
        let handler = self
            .roles
            .handlers
            .get(&key)
            .map(|e| e.clone())
            .ok_or_else(|| RpcError::MethodNotFound { role: role.to_string(), method: method.to_string() })?;

        let handle = self
            .registry
            .get_loaded(target)
            .await
            .map_err(|e| RpcError::RemoteError(e.to_string()))?;
        handler(handle, args)
    }
}

/// A [`ResidencyCheck`] delegating to the scheduler's own running-agent
/// table.
pub struct SchedulerResidency {
    scheduler: Arc<Scheduler>,
}

impl SchedulerResidency {
    /// Check residency against `scheduler`.
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

impl ResidencyCheck for SchedulerResidency {
    fn is_resident(&self, target: ObjectId) -> bool {
        self.scheduler.is_resident(target)
    }
}

/// A [`NodeLocator`] for a single-node deployment: every target routes
/// to the one node this process runs on. A multi-node cluster needs a
/// real node directory (spec §9 open question territory); out of scope
/// here.
pub struct SingleNodeLocator {
    node: NodeId,
}

impl SingleNodeLocator {
    /// A locator that always answers `node`.
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }
}

impl NodeLocator for SingleNodeLocator {
    fn node_for(&self, _target: ObjectId) -> NodeId {
        self.node.clone()
    }
}

/// Field names the scheduler reads off a Node object to learn which
/// agents should be installed or running (spec §4.H: "diffs desired vs.
/// running agent set").
const FIELD_AGENTS_INSTALLED: &str = "agents_installed";
const FIELD_AGENTS_RUNNING: &str = "agents_running";
const FIELD_MASTER_AGENTS_RUNNING: &str = "master_agents_running";

/// A [`DesiredSetSource`] reading the desired agent set off a Node web
/// object: `master_agents_running` for the master worker, plus
/// `agents_running` for every worker (spec §4.H).
pub struct NodeDesiredSet {
    registry: Registry,
    classes: Arc<dyn ClassResolver>,
    node_object: ObjectId,
}

impl NodeDesiredSet {
    /// Reads `node_object`'s agent fields through `registry`, resolving
    /// its class via `classes`.
    pub fn new(registry: Registry, classes: Arc<dyn ClassResolver>, node_object: ObjectId) -> Self {
        Self { registry, classes, node_object }
    }
}

impl NodeDesiredSet {
    /// Reads the `Ref`-valued entries of each field in `fields` off the
    /// node object, resolving its class to know how to compute them.
    async fn read_ref_fields(&self, fields: &[&str]) -> Vec<ObjectId> {
        let Ok(handle) = self.registry.get_loaded(self.node_object).await else {
            return Vec::new();
        };
        let guard = handle.read().expect("object lock poisoned");
        let Some(category) = guard.category() else {
            return Vec::new();
        };
        let Some(class) = self.classes.resolve(category) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for field in fields {
            let Ok(values) = guard.get_field_all(field, &*class) else { continue };
            out.extend(values.into_iter().filter_map(|v| match v {
                schemat_catalog::Value::Ref(id) => Some(id),
                _ => None,
            }));
        }
        out
    }
}

#[async_trait]
impl DesiredSetSource for NodeDesiredSet {
    async fn desired_agents(&self, worker: WorkerId) -> Vec<ObjectId> {
        let mut fields = vec![FIELD_AGENTS_RUNNING];
        if worker.is_master() {
            fields.push(FIELD_MASTER_AGENTS_RUNNING);
        }
        self.read_ref_fields(&fields).await
    }

    async fn installed_agents(&self, _worker: WorkerId) -> Vec<ObjectId> {
        self.read_ref_fields(&[FIELD_AGENTS_INSTALLED]).await
    }
}

/// An [`AgentSource`] that always hands back the same hooks, for
/// deployments with a single agent class (tests and bootstrapping; a
/// real deployment resolves hooks per agent's category the same way
/// [`NodeDesiredSet`] resolves a class).
pub struct FixedHooks(pub Arc<dyn schemat_scheduler::AgentHooks>);

impl AgentSource for FixedHooks {
    fn hooks_for(&self, _agent: ObjectId) -> Arc<dyn schemat_scheduler::AgentHooks> {
        self.0.clone()
    }
}

/// Produce a [`RoleHandle`] for `field` on `target`, for callers that
/// already know they are looking at a role access (spec §4.E point 4).
pub fn role_handle(target: ObjectId, field: &str) -> Option<RoleHandle> {
    schemat_object::parse_role(target, field)
}

//! The process-wide [`Runtime`]: wires a [`Registry`], the cluster
//! bus, the scheduler, and the RPC client together for one worker
//! (spec §2 data flow, §6 bootstrap).

use std::sync::Arc;
use std::time::Duration;

use schemat_bus::InMemoryBus;
use schemat_registry::{DefaultTtlPolicy, Registry};
use schemat_rpc::RpcClient;
use schemat_scheduler::{AgentSource, DesiredSetSource, Scheduler};
use schemat_store::RingStack;
use schemat_store_memory::MemoryRing;
use schemat_types::{NodeId, ObjectId, WorkerId};

use crate::config::RuntimeConfig;
use crate::dispatch::{ClassResolver, RegistryDispatcher, RoleRegistry, SchedulerResidency, SingleNodeLocator};
use crate::error::RuntimeResult;

/// A fully wired worker process: the object registry, the cluster bus,
/// the per-node scheduler, and the role-based RPC client that ties
/// lifecycle calls and remote property access together.
pub struct Runtime {
    registry: Registry,
    bus: InMemoryBus,
    classes: Arc<dyn ClassResolver>,
    roles: Arc<RoleRegistry>,
    scheduler: Arc<Scheduler>,
    rpc: Arc<RpcClient>,
    node_id: NodeId,
    worker_id: WorkerId,
}

impl Runtime {
    /// Build a runtime for `worker_id` on `node_id`, backed by rings
    /// built from `config`, converging `desired_source`'s agent set via
    /// `agent_source`'s hooks.
    pub fn new(
        config: &RuntimeConfig,
        classes: Arc<dyn ClassResolver>,
        node_id: NodeId,
        worker_id: WorkerId,
        desired_source: impl DesiredSetSource + 'static,
        agent_source: impl AgentSource + 'static,
    ) -> RuntimeResult<Self> {
        let rings = config
            .rings
            .iter()
            .map(|r| -> Box<dyn schemat_store::RingStore> {
                if r.read_only {
                    Box::new(MemoryRing::read_only(r.name.clone(), Vec::new()))
                } else {
                    Box::new(MemoryRing::new(r.name.clone()))
                }
            })
            .collect();
        let store = RingStack::new(rings);
        let registry = Registry::new(store, DefaultTtlPolicy::new(config.default_ttl()));

        let bus = InMemoryBus::new(config.bus_capacity);
        let roles = Arc::new(RoleRegistry::new());
        let scheduler = Arc::new(Scheduler::new(registry.clone(), desired_source, agent_source, worker_id));

        let dispatcher = RegistryDispatcher::new(registry.clone(), roles.clone());
        let residency = SchedulerResidency::new(scheduler.clone());
        let locator = SingleNodeLocator::new(node_id.clone());
        let rpc = Arc::new(RpcClient::new(
            bus.clone(),
            residency,
            locator,
            dispatcher,
            node_id.clone(),
            config.rpc_timeout(),
        ));

        Ok(Self { registry, bus, classes, roles, scheduler, rpc, node_id, worker_id })
    }

    /// Start the background tasks that keep this worker alive: the RPC
    /// reply listener, and (master only, spec §4.H) the shutdown
    /// signal listener.
    pub fn spawn_background_tasks(&self) {
        self.rpc.spawn_reply_listener();
        self.scheduler.spawn_shutdown_listener();
    }

    /// Run one convergence pass now (spec §4.H's loop body; a
    /// long-running process calls this on an interval).
    pub async fn converge_once(&self) -> schemat_scheduler::ConvergeReport {
        self.scheduler.converge_once().await
    }

    /// Run convergence passes every `interval` until
    /// [`Scheduler::request_shutdown`] has drained every agent.
    pub async fn run_convergence_loop(&self, interval: Duration) {
        loop {
            self.scheduler.converge_once().await;
            if self.scheduler.is_closing() && self.scheduler.running_agents().is_empty() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// This process's object registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// This process's cluster bus handle.
    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }

    /// The class resolver this runtime was built with.
    pub fn classes(&self) -> &Arc<dyn ClassResolver> {
        &self.classes
    }

    /// The role-method handler table, for classes to install their
    /// handlers into at boot.
    pub fn roles(&self) -> &Arc<RoleRegistry> {
        &self.roles
    }

    /// This process's agent scheduler.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// This process's RPC client, for synthesizing `$role.method()`
    /// calls (spec §4.E point 4, §4.I).
    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    /// The node this process runs on.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// This process's worker index (`0` is the master).
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Ask the scheduler to drain every agent and stop wanting new
    /// ones; callers should keep calling [`Runtime::converge_once`] (or
    /// run [`Runtime::run_convergence_loop`]) until it returns an empty
    /// report.
    pub fn request_shutdown(&self) {
        self.scheduler.request_shutdown();
    }
}

/// Resolve an object id that may be a bare integer or (not yet
/// supported) a URL path, per spec §6's HTTP entry note that targets
/// are resolved as `(target-object, endpoint-name)`; this crate only
/// exposes the integer-id form since URL resolution lives at the HTTP
/// edge, out of scope here.
pub fn parse_object_id(raw: &str) -> Option<ObjectId> {
    raw.trim().parse::<i64>().ok().map(ObjectId)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use schemat_catalog::Catalog;
    use schemat_object::{GetterOutcome, ObjectClass, WebObject};
    use schemat_schema::Schema;
    use schemat_scheduler::AgentHooks;

    use super::*;

    struct NoClass;
    impl ObjectClass for NoClass {
        fn classpath(&self) -> &str {
            "test.Empty"
        }
        fn schema(&self) -> &Schema {
            static SCHEMA: std::sync::OnceLock<Schema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| Schema::new(vec![], false))
        }
        fn invoke_getter(&self, _field: &str, _obj: &WebObject) -> Option<GetterOutcome> {
            None
        }
    }

    struct NoAgents;
    #[async_trait]
    impl DesiredSetSource for NoAgents {
        async fn desired_agents(&self, _worker: WorkerId) -> Vec<ObjectId> {
            Vec::new()
        }
    }

    struct NoHooks;
    impl AgentHooks for NoHooks {
        fn start(&self, _agent: &WebObject) -> serde_json::Value {
            serde_json::Value::Null
        }
        fn stop(&self, _agent: &WebObject, _state: &serde_json::Value) {}
        fn restart(&self, _agent: &WebObject, _state: &serde_json::Value, _prev: &WebObject) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    struct SingleHooks(Arc<dyn AgentHooks>);
    impl AgentSource for SingleHooks {
        fn hooks_for(&self, _agent: ObjectId) -> Arc<dyn AgentHooks> {
            self.0.clone()
        }
    }

    fn test_runtime() -> Runtime {
        let config = RuntimeConfig::test_config();
        let classes: Arc<dyn ClassResolver> = Arc::new(crate::dispatch::StaticClassResolver::new());
        Runtime::new(
            &config,
            classes,
            NodeId("test-node".into()),
            WorkerId::MASTER,
            NoAgents,
            SingleHooks(Arc::new(NoHooks)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn a_fresh_runtime_converges_to_an_empty_report() {
        let runtime = test_runtime();
        let report = runtime.converge_once().await;
        assert!(report.started.is_empty());
        assert!(report.stopped.is_empty());
        assert!(report.refreshed.is_empty());
    }

    #[tokio::test]
    async fn commit_insert_through_the_registry_is_readable_back() {
        let runtime = test_runtime();
        let class = NoClass;
        let id = runtime.registry().commit_insert(&Catalog::new(), None).await.unwrap();
        let handle = runtime.registry().get_loaded(id).await.unwrap();
        assert_eq!(handle.read().unwrap().version(), 1);
        let _ = class.schema();
    }

    #[tokio::test]
    async fn registered_role_handler_dispatches_through_the_registry_adapter() {
        use schemat_rpc::LocalDispatcher;

        let runtime = test_runtime();
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = seen.clone();
            runtime.roles().register(
                "worker",
                "ping",
                Arc::new(move |_obj, args| {
                    *seen.lock().unwrap() = Some(args.clone());
                    Ok(serde_json::json!({"pong": true}))
                }),
            );
        }

        let id = runtime.registry().commit_insert(&Catalog::new(), None).await.unwrap();
        let dispatcher = crate::dispatch::RegistryDispatcher::new(runtime.registry().clone(), runtime.roles().clone());
        let reply = dispatcher.dispatch(id, "worker", "ping", serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(reply, serde_json::json!({"pong": true}));
        assert_eq!(*seen.lock().unwrap(), Some(serde_json::json!({"n": 1})));
    }

    #[tokio::test]
    async fn an_unregistered_role_method_is_not_found() {
        use schemat_rpc::LocalDispatcher;

        let runtime = test_runtime();
        let id = runtime.registry().commit_insert(&Catalog::new(), None).await.unwrap();
        let dispatcher = crate::dispatch::RegistryDispatcher::new(runtime.registry().clone(), runtime.roles().clone());
        let err = dispatcher.dispatch(id, "worker", "missing", serde_json::Value::Null).await.unwrap_err();
        assert_eq!(err, schemat_rpc::RpcError::MethodNotFound { role: "worker".into(), method: "missing".into() });
    }

    #[test]
    fn parse_object_id_rejects_non_numeric_input() {
        assert_eq!(parse_object_id("42"), Some(ObjectId(42)));
        assert_eq!(parse_object_id("not-a-number"), None);
    }
}

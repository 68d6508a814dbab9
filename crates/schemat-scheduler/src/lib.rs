#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-scheduler** – the per-node agent scheduler: a convergence
//! loop that starts, stops, and restarts agent objects to match a
//! desired set (spec §4.H).

mod hooks;
mod scheduler;

pub use hooks::{AgentHooks, AgentSource, DesiredSetSource};
pub use scheduler::{ConvergeReport, Scheduler};

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use schemat_catalog::Catalog;
    use schemat_object::WebObject;
    use schemat_registry::{DefaultTtlPolicy, Registry};
    use schemat_store::RingStack;
    use schemat_store_memory::MemoryRing;
    use schemat_types::{ObjectId, WorkerId};

    use super::*;

    fn registry() -> Registry {
        let ring = MemoryRing::new("primary");
        let stack = RingStack::new(vec![Box::new(ring)]);
        Registry::new(stack, DefaultTtlPolicy::new(Duration::from_secs(60)))
    }

    struct RecordingHooks {
        log: Arc<Mutex<Vec<(ObjectId, &'static str)>>>,
    }

    impl AgentHooks for RecordingHooks {
        fn install(&self, agent: &WebObject) {
            self.log.lock().unwrap().push((agent.id().unwrap(), "install"));
        }

        fn start(&self, agent: &WebObject) -> serde_json::Value {
            self.log.lock().unwrap().push((agent.id().unwrap(), "start"));
            serde_json::json!({"ticks": 0})
        }

        fn stop(&self, agent: &WebObject, _state: &serde_json::Value) {
            self.log.lock().unwrap().push((agent.id().unwrap(), "stop"));
        }

        fn restart(&self, agent: &WebObject, _state: &serde_json::Value, _prev: &WebObject) -> serde_json::Value {
            self.log.lock().unwrap().push((agent.id().unwrap(), "restart"));
            serde_json::json!({"ticks": 1})
        }

        fn uninstall(&self, agent: &WebObject) {
            self.log.lock().unwrap().push((agent.id().unwrap(), "uninstall"));
        }
    }

    struct SharedHooks(Arc<RecordingHooks>);

    impl AgentSource for SharedHooks {
        fn hooks_for(&self, _agent: ObjectId) -> Arc<dyn AgentHooks> {
            self.0.clone()
        }
    }

    struct FixedDesiredSet(Arc<Mutex<Vec<ObjectId>>>);

    #[async_trait::async_trait]
    impl DesiredSetSource for FixedDesiredSet {
        async fn desired_agents(&self, _worker: WorkerId) -> Vec<ObjectId> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FixedBothSets {
        running: Arc<Mutex<Vec<ObjectId>>>,
        installed: Arc<Mutex<Vec<ObjectId>>>,
    }

    #[async_trait::async_trait]
    impl DesiredSetSource for FixedBothSets {
        async fn desired_agents(&self, _worker: WorkerId) -> Vec<ObjectId> {
            self.running.lock().unwrap().clone()
        }

        async fn installed_agents(&self, _worker: WorkerId) -> Vec<ObjectId> {
            self.installed.lock().unwrap().clone()
        }
    }

    async fn seed(registry: &Registry) -> ObjectId {
        registry.commit_insert(&Catalog::new(), None).await.unwrap()
    }

    #[tokio::test]
    async fn converge_starts_stops_and_leaves_unchanged_agents_alone() {
        let registry = registry();
        let a = seed(&registry).await;
        let b = seed(&registry).await;
        let c = seed(&registry).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Arc::new(RecordingHooks { log: log.clone() });
        let desired = Arc::new(Mutex::new(vec![a, b]));
        let scheduler = Scheduler::new(
            registry.clone(),
            FixedDesiredSet(desired.clone()),
            SharedHooks(hooks.clone()),
            WorkerId(0),
        );

        // First tick: {} -> {A,B}. Both start, nothing to stop or refresh.
        let first = scheduler.converge_once().await;
        assert_eq!(first.stopped, Vec::<ObjectId>::new());
        let mut started: Vec<_> = first.started.clone();
        started.sort_by_key(|id| id.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.0);
        assert_eq!(started, expected);

        // Second tick: desired moves to {B,C}. Expect exactly one stop(A),
        // one start(C), and B only refreshed (no restart — its instance
        // was never replaced) (spec §8 scenario 5).
        *desired.lock().unwrap() = vec![b, c];
        let second = scheduler.converge_once().await;
        assert_eq!(second.stopped, vec![a]);
        assert_eq!(second.started, vec![c]);
        assert_eq!(second.refreshed, vec![b]);

        let events = log.lock().unwrap().clone();
        assert_eq!(events.iter().filter(|(id, ev)| *id == a && *ev == "stop").count(), 1);
        assert_eq!(events.iter().filter(|(id, ev)| *id == c && *ev == "start").count(), 1);
        assert!(!events.iter().any(|(id, ev)| *id == b && *ev == "restart"));

        assert_eq!(scheduler.running_agents().len(), 2);
    }

    #[tokio::test]
    async fn refresh_restarts_only_when_the_instance_was_replaced() {
        let registry = registry();
        let a = seed(&registry).await;
        let b = seed(&registry).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Arc::new(RecordingHooks { log: log.clone() });
        let desired = Arc::new(Mutex::new(vec![a, b]));
        let scheduler = Scheduler::new(
            registry.clone(),
            FixedDesiredSet(desired.clone()),
            SharedHooks(hooks.clone()),
            WorkerId(0),
        );

        scheduler.converge_once().await;
        log.lock().unwrap().clear();

        // B's record is overwritten out from under the scheduler, bumping
        // its version; A is untouched.
        registry.commit_overwrite(b, &Catalog::new(), 2, None, None).await.unwrap();

        let report = scheduler.converge_once().await;
        assert_eq!(report.stopped, Vec::<ObjectId>::new());
        assert_eq!(report.started, Vec::<ObjectId>::new());

        let events = log.lock().unwrap().clone();
        assert!(events.contains(&(b, "restart")));
        assert!(!events.iter().any(|(id, ev)| *id == a && *ev == "restart"));
    }

    #[tokio::test]
    async fn shutdown_drains_every_running_agent() {
        let registry = registry();
        let a = seed(&registry).await;
        let b = seed(&registry).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Arc::new(RecordingHooks { log: log.clone() });
        let desired = Arc::new(Mutex::new(vec![a, b]));
        let scheduler = Scheduler::new(
            registry.clone(),
            FixedDesiredSet(desired.clone()),
            SharedHooks(hooks.clone()),
            WorkerId(0),
        );

        scheduler.converge_once().await;
        assert!(!scheduler.is_closing());

        scheduler.request_shutdown();
        let report = scheduler.converge_once().await;

        let mut stopped = report.stopped.clone();
        stopped.sort_by_key(|id| id.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.0);
        assert_eq!(stopped, expected);
        assert!(scheduler.running_agents().is_empty());
    }

    #[tokio::test]
    async fn install_and_uninstall_run_independently_of_start_and_stop() {
        let registry = registry();
        let a = seed(&registry).await;
        let b = seed(&registry).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Arc::new(RecordingHooks { log: log.clone() });
        let running = Arc::new(Mutex::new(Vec::new()));
        let installed = Arc::new(Mutex::new(vec![a]));
        let scheduler = Scheduler::new(
            registry.clone(),
            FixedBothSets { running: running.clone(), installed: installed.clone() },
            SharedHooks(hooks.clone()),
            WorkerId(0),
        );

        // A is installed but never desired to run: install fires, start never does.
        let first = scheduler.converge_once().await;
        assert_eq!(first.installed, vec![a]);
        assert_eq!(first.started, Vec::<ObjectId>::new());
        assert_eq!(scheduler.installed_agents(), vec![a]);

        // B becomes installed and desired to run in the same tick: install
        // must precede start.
        *installed.lock().unwrap() = vec![a, b];
        *running.lock().unwrap() = vec![b];
        let second = scheduler.converge_once().await;
        assert_eq!(second.installed, vec![b]);
        assert_eq!(second.started, vec![b]);

        // A is uninstalled; it was never running, so no stop fires for it.
        *installed.lock().unwrap() = vec![b];
        let third = scheduler.converge_once().await;
        assert_eq!(third.uninstalled, vec![a]);
        assert_eq!(third.stopped, Vec::<ObjectId>::new());

        let events = log.lock().unwrap().clone();
        let b_install_idx = events.iter().position(|(id, ev)| *id == b && *ev == "install").unwrap();
        let b_start_idx = events.iter().position(|(id, ev)| *id == b && *ev == "start").unwrap();
        assert!(b_install_idx < b_start_idx, "install must run before start for an agent installed and started in the same tick");
        assert!(events.contains(&(a, "uninstall")));
        assert!(!events.iter().any(|(id, ev)| *id == a && *ev == "stop"));
    }
}

//! Convergence loop: reconciles the running-agent set against the
//! desired set on every tick (spec §4.H).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use schemat_registry::Registry;
use schemat_types::{ObjectId, WorkerId};

use crate::hooks::{AgentHooks, AgentSource, DesiredSetSource};

struct AgentSlot {
    state: serde_json::Value,
    version: u64,
}

/// What one [`Scheduler::converge_once`] pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvergeReport {
    /// Agents whose `__install__` hook ran this tick.
    pub installed: Vec<ObjectId>,
    /// Agents whose `__uninstall__` hook ran this tick.
    pub uninstalled: Vec<ObjectId>,
    /// Agents whose `__stop__` hook ran this tick.
    pub stopped: Vec<ObjectId>,
    /// Agents whose `__start__` hook ran this tick.
    pub started: Vec<ObjectId>,
    /// Agents still desired whose instance was checked for replacement
    /// (only a subset of these actually ran `__restart__`).
    pub refreshed: Vec<ObjectId>,
}

/// Converges one node's running agents toward its desired set, one
/// agent at a time, never overlapping two lifecycle calls on the same
/// agent (spec §4.H, §5).
pub struct Scheduler {
    registry: Registry,
    desired_source: Arc<dyn DesiredSetSource>,
    agent_source: Arc<dyn AgentSource>,
    worker_id: WorkerId,
    running: DashMap<ObjectId, AgentSlot>,
    installed: DashMap<ObjectId, ()>,
    locks: DashMap<ObjectId, Arc<AsyncMutex<()>>>,
    is_closing: Arc<AtomicBool>,
}

impl Scheduler {
    /// A scheduler for `worker_id`, computing its desired set from
    /// `desired_source` and resolving lifecycle hooks via `agent_source`.
    pub fn new(
        registry: Registry,
        desired_source: impl DesiredSetSource + 'static,
        agent_source: impl AgentSource + 'static,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            registry,
            desired_source: Arc::new(desired_source),
            agent_source: Arc::new(agent_source),
            worker_id,
            running: DashMap::new(),
            installed: DashMap::new(),
            locks: DashMap::new(),
            is_closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether this scheduler has been asked to drain.
    pub fn is_closing(&self) -> bool {
        self.is_closing.load(Ordering::SeqCst)
    }

    /// Ask the scheduler to stop wanting any agents; the next
    /// [`Scheduler::converge_once`] will drain everything currently
    /// running.
    pub fn request_shutdown(&self) {
        self.is_closing.store(true, Ordering::SeqCst);
    }

    /// Agents currently tracked as running.
    pub fn running_agents(&self) -> Vec<ObjectId> {
        self.running.iter().map(|e| *e.key()).collect()
    }

    /// Agents currently tracked as installed (possibly not running).
    pub fn installed_agents(&self) -> Vec<ObjectId> {
        self.installed.iter().map(|e| *e.key()).collect()
    }

    /// Whether `id` is a locally running agent right now.
    pub fn is_resident(&self, id: ObjectId) -> bool {
        self.running.contains_key(&id)
    }

    /// Install a background task that flips [`Scheduler::is_closing`] on
    /// `SIGINT`/`SIGTERM` (spec §5: "clean shutdown drains all agents
    /// before process exit").
    pub fn spawn_shutdown_listener(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(signal) => signal,
                    Err(err) => {
                        warn!(error = %err, "failed to install SIGTERM handler");
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
            info!("shutdown signal received, draining agents");
            this.request_shutdown();
        });
    }

    fn lock_for(&self, id: ObjectId) -> Arc<AsyncMutex<()>> {
        self.locks.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// One convergence pass: diff the installed set and the running set
    /// against their respective desired sets, dispatching
    /// `__install__`/`__uninstall__` ahead of
    /// `__stop__`/`__start__`/`__restart__` (spec §4.H pseudocode). The
    /// install/uninstall batch is awaited before the start/stop batch so
    /// a freshly-installed agent is never started ahead of its install.
    pub async fn converge_once(&self) -> ConvergeReport {
        let desired_installed: HashSet<ObjectId> =
            self.desired_source.installed_agents(self.worker_id).await.into_iter().collect();
        let current_installed: HashSet<ObjectId> = self.installed.iter().map(|e| *e.key()).collect();

        let to_install: Vec<ObjectId> = desired_installed.difference(&current_installed).copied().collect();
        let to_uninstall: Vec<ObjectId> = current_installed.difference(&desired_installed).copied().collect();

        tokio::join!(
            futures::future::join_all(to_install.iter().map(|id| self.install_agent(*id))),
            futures::future::join_all(to_uninstall.iter().map(|id| self.uninstall_agent(*id))),
        );

        let desired: HashSet<ObjectId> = if self.is_closing() {
            HashSet::new()
        } else {
            self.desired_source.desired_agents(self.worker_id).await.into_iter().collect()
        };
        let current: HashSet<ObjectId> = self.running.iter().map(|e| *e.key()).collect();

        let to_stop: Vec<ObjectId> = current.difference(&desired).copied().collect();
        let to_start: Vec<ObjectId> = desired.difference(&current).copied().collect();
        let to_refresh: Vec<ObjectId> = current.intersection(&desired).copied().collect();

        let (_, _, _) = tokio::join!(
            futures::future::join_all(to_stop.iter().map(|id| self.stop_agent(*id))),
            futures::future::join_all(to_start.iter().map(|id| self.start_agent(*id))),
            futures::future::join_all(to_refresh.iter().map(|id| self.refresh_agent(*id))),
        );

        ConvergeReport {
            installed: to_install,
            uninstalled: to_uninstall,
            stopped: to_stop,
            started: to_start,
            refreshed: to_refresh,
        }
    }

    async fn install_agent(&self, id: ObjectId) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let handle = match self.registry.get_loaded(id).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(agent = %id, error = %err, "agent install failed, will retry next tick");
                return;
            }
        };
        let hooks: Arc<dyn AgentHooks> = self.agent_source.hooks_for(id);
        {
            let guard = handle.read().expect("object lock poisoned");
            hooks.install(&guard);
        }
        self.installed.insert(id, ());
        info!(agent = %id, "agent installed");
    }

    async fn uninstall_agent(&self, id: ObjectId) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        if self.installed.remove(&id).is_none() {
            return;
        }
        let handle = self.registry.get_object(id);
        let hooks = self.agent_source.hooks_for(id);
        let guard = handle.read().expect("object lock poisoned");
        hooks.uninstall(&guard);
        info!(agent = %id, "agent uninstalled");
    }

    async fn start_agent(&self, id: ObjectId) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let handle = match self.registry.get_loaded(id).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(agent = %id, error = %err, "agent start failed, will retry next tick");
                return;
            }
        };
        let hooks: Arc<dyn AgentHooks> = self.agent_source.hooks_for(id);
        let (state, version) = {
            let guard = handle.read().expect("object lock poisoned");
            let state = hooks.start(&guard);
            (state, guard.version())
        };
        self.running.insert(id, AgentSlot { state, version });
        info!(agent = %id, "agent started");
    }

    async fn stop_agent(&self, id: ObjectId) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some((_, slot)) = self.running.remove(&id) else { return };
        let handle = self.registry.get_object(id);
        let hooks = self.agent_source.hooks_for(id);
        let guard = handle.read().expect("object lock poisoned");
        hooks.stop(&guard, &slot.state);
        info!(agent = %id, "agent stopped");
    }

    async fn refresh_agent(&self, id: ObjectId) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(slot_version) = self.running.get(&id).map(|s| s.version) else { return };
        // The handle captured before `reload` keeps pointing at the old
        // instance once the registry swaps its cache entry, so this
        // doubles as the `prev` snapshot `__restart__` needs.
        let prev_handle = self.registry.get_object(id);
        if let Err(err) = self.registry.reload(id).await {
            debug!(agent = %id, error = %err, "agent refresh reload failed");
            return;
        }
        let new_handle = self.registry.get_object(id);
        let new_version = new_handle.read().expect("object lock poisoned").version();
        if new_version == slot_version {
            return;
        }

        let hooks = self.agent_source.hooks_for(id);
        let prev_guard = prev_handle.read().expect("object lock poisoned");
        let new_guard = new_handle.read().expect("object lock poisoned");
        let prev_state = self.running.get(&id).map(|s| s.state.clone()).unwrap_or(serde_json::Value::Null);
        let new_state = hooks.restart(&new_guard, &prev_state, &prev_guard);
        drop(prev_guard);
        drop(new_guard);

        self.running.insert(id, AgentSlot { state: new_state, version: new_version });
        info!(agent = %id, "agent restarted");
    }
}

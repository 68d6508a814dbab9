#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-runtime** – the bootstrap adapter: turns a
//! [`config::RuntimeConfig`] plus a few registered classes into a
//! fully wired worker process (registry, bus, scheduler, RPC client)
//! ready to run a convergence loop (spec §2, §6).

mod config;
mod dispatch;
mod error;
mod runtime;

pub use config::{
    config_path, node_id_from_default_file, node_id_from_file, worker_id_from_env, RingConfig,
    RuntimeConfig, DEFAULT_CONFIG_PATH, DEFAULT_NODE_ID_PATH,
};
pub use dispatch::{
    role_handle, ClassResolver, FixedHooks, NodeDesiredSet, RegistryDispatcher, RoleHandler,
    RoleRegistry, SchedulerResidency, SingleNodeLocator, StaticClassResolver,
};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{parse_object_id, Runtime};

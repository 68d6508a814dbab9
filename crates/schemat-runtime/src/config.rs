//! Bootstrap configuration: the YAML config file, the `WORKER_ID`
//! environment variable, and the node ID file (spec §6).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use schemat_types::{NodeId, WorkerId};

use crate::error::{RuntimeError, RuntimeResult};

/// Default path the runtime looks for a config file at, relative to the
/// process's working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./schemat/config.yaml";

/// Default path the runtime reads this node's id from.
pub const DEFAULT_NODE_ID_PATH: &str = "./schemat/node.id";

/// One ring in the storage stack, primary first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Name this ring tags its records with.
    pub name: String,
    /// Whether this ring rejects direct writes.
    #[serde(default)]
    pub read_only: bool,
}

/// Configuration for one worker process (spec §6 bootstrap section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Cluster bus topic buffer capacity, per node.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    /// How long an outgoing RPC call waits for a reply before timing
    /// out (spec §4.I).
    #[serde(default = "default_rpc_timeout_ms", rename = "rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Default TTL applied to cached objects loaded from a ring not
    /// otherwise configured (spec §4.F).
    #[serde(default = "default_ttl_secs", rename = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Storage rings, primary first.
    #[serde(default = "default_rings")]
    pub rings: Vec<RingConfig>,
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_rings() -> Vec<RingConfig> {
    vec![RingConfig { name: "primary".to_string(), read_only: false }]
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            default_ttl_secs: default_ttl_secs(),
            rings: default_rings(),
        }
    }
}

impl RuntimeConfig {
    /// Load from a YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Configuration(format!("{}: {}", path.display(), e)))?;
        serde_yaml::from_str(&text)
            .map_err(|e| RuntimeError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Load from [`DEFAULT_CONFIG_PATH`] if it exists, otherwise fall
    /// back to [`RuntimeConfig::default`] (a fresh deployment has no
    /// config file yet).
    pub fn load_default() -> RuntimeResult<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// A config suitable for unit and integration tests: one in-memory
    /// primary ring, short timeouts.
    pub fn test_config() -> Self {
        Self {
            bus_capacity: 16,
            rpc_timeout_ms: 200,
            default_ttl_secs: 60,
            rings: vec![RingConfig { name: "primary".to_string(), read_only: false }],
        }
    }

    /// This config's RPC timeout as a [`Duration`].
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// This config's default TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Read this process's worker index from `WORKER_ID` (spec §6); `0`
/// (the master) if unset.
pub fn worker_id_from_env() -> WorkerId {
    std::env::var("WORKER_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(WorkerId)
        .unwrap_or(WorkerId::MASTER)
}

/// Read this node's id from `path`, trimmed of surrounding whitespace.
pub fn node_id_from_file(path: impl AsRef<Path>) -> RuntimeResult<NodeId> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| RuntimeError::MissingNodeId(format!("{}: {}", path.display(), e)))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RuntimeError::MissingNodeId(format!("{} is empty", path.display())));
    }
    Ok(NodeId(trimmed.to_string()))
}

/// Read this node's id from [`DEFAULT_NODE_ID_PATH`].
pub fn node_id_from_default_file() -> RuntimeResult<NodeId> {
    node_id_from_file(Path::new(DEFAULT_NODE_ID_PATH))
}

/// Resolve the config file path from an optional override, falling
/// back to [`DEFAULT_CONFIG_PATH`].
pub fn config_path(override_path: Option<PathBuf>) -> PathBuf {
    override_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

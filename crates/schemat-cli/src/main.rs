#![forbid(unsafe_code)]

//! **schemat-cli** – command-line entry point for one Schemat worker
//! process: `run`, `reinsert`, `create-cluster` (spec §6).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schemat_object::WebObject;
use schemat_runtime::{config_path, node_id_from_file, worker_id_from_env, Runtime, RuntimeConfig, StaticClassResolver, DEFAULT_NODE_ID_PATH};
use schemat_scheduler::AgentHooks;
use schemat_store::RingStack;
use schemat_store_memory::MemoryRing;
use schemat_types::ObjectId;

#[derive(Parser)]
#[command(name = "schemat")]
#[command(about = "Schemat core object runtime worker")]
#[command(version)]
struct Cli {
    /// Path to the runtime config YAML file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to this node's id file.
    #[arg(long, default_value = DEFAULT_NODE_ID_PATH)]
    node_id_file: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run this worker's convergence loop until interrupted.
    Run {
        /// Seconds between convergence passes.
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Reinsert one or more records, optionally under a new id or into
    /// a named ring.
    Reinsert {
        /// Ids to reinsert.
        ids: Vec<i64>,
        /// Reinsert under this id instead (requires exactly one id).
        #[arg(long = "new")]
        new_id: Option<i64>,
        /// Target this ring specifically, bypassing normal propagation.
        #[arg(long)]
        ring: Option<String>,
    },
    /// Validate a cluster manifest. Provisioning itself is out of
    /// scope; this only checks the manifest parses.
    CreateCluster {
        /// Path to the cluster manifest.
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config_path = config_path(cli.config.clone());
    let config = if config_path.exists() {
        RuntimeConfig::load(&config_path).with_context(|| format!("loading {}", config_path.display()))?
    } else {
        debug!(path = %config_path.display(), "no config file found, using defaults");
        RuntimeConfig::default()
    };

    match cli.command {
        Commands::Run { interval_secs } => handle_run(&config, &cli.node_id_file, interval_secs).await,
        Commands::Reinsert { ids, new_id, ring } => {
            let stack = RingStack::new(build_rings(&config));
            handle_reinsert(&stack, ids, new_id, ring).await
        }
        Commands::CreateCluster { manifest } => handle_create_cluster(&manifest),
    }
}

struct NoopHooks;

impl AgentHooks for NoopHooks {
    fn start(&self, agent: &WebObject) -> serde_json::Value {
        info!(agent = ?agent.id(), "starting agent");
        serde_json::Value::Null
    }

    fn stop(&self, agent: &WebObject, _state: &serde_json::Value) {
        info!(agent = ?agent.id(), "stopping agent");
    }

    fn restart(&self, agent: &WebObject, _state: &serde_json::Value, _prev: &WebObject) -> serde_json::Value {
        info!(agent = ?agent.id(), "restarting agent");
        serde_json::Value::Null
    }
}

struct NoAgents;

#[async_trait]
impl schemat_scheduler::DesiredSetSource for NoAgents {
    async fn desired_agents(&self, _worker: schemat_types::WorkerId) -> Vec<ObjectId> {
        Vec::new()
    }
}

struct FixedHooks(Arc<dyn AgentHooks>);

impl schemat_scheduler::AgentSource for FixedHooks {
    fn hooks_for(&self, _agent: ObjectId) -> Arc<dyn AgentHooks> {
        self.0.clone()
    }
}

async fn handle_run(config: &RuntimeConfig, node_id_file: &Path, interval_secs: u64) -> Result<()> {
    let worker_id = worker_id_from_env();
    let node_id = node_id_from_file(node_id_file)
        .with_context(|| format!("reading node id from {}", node_id_file.display()))?;

    info!(node = %node_id, worker = worker_id.0, "starting schemat worker");

    let classes = Arc::new(StaticClassResolver::new());
    let runtime = Runtime::new(config, classes, node_id, worker_id, NoAgents, FixedHooks(Arc::new(NoopHooks)))
        .context("building runtime")?;
    runtime.spawn_background_tasks();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let loop_fut = runtime.run_convergence_loop(std::time::Duration::from_secs(interval_secs));
    tokio::pin!(loop_fut);

    tokio::select! {
        _ = &mut loop_fut => {}
        _ = &mut shutdown => {
            info!("shutdown signal received, draining agents");
            runtime.request_shutdown();
            loop_fut.await;
        }
    }

    info!("worker stopped");
    Ok(())
}

fn build_rings(config: &RuntimeConfig) -> Vec<Box<dyn schemat_store::RingStore>> {
    config
        .rings
        .iter()
        .map(|r| -> Box<dyn schemat_store::RingStore> {
            if r.read_only {
                Box::new(MemoryRing::read_only(r.name.clone(), Vec::new()))
            } else {
                Box::new(MemoryRing::new(r.name.clone()))
            }
        })
        .collect()
}

async fn handle_reinsert(stack: &RingStack, ids: Vec<i64>, new_id: Option<i64>, ring: Option<String>) -> Result<()> {
    if new_id.is_some() && ids.len() != 1 {
        bail!("--new requires exactly one id");
    }

    for raw_id in ids {
        let id = ObjectId(raw_id);
        let record = stack
            .select(id)
            .await
            .with_context(|| format!("reading record {id}"))?
            .ok_or_else(|| anyhow::anyhow!("no record for {id} in any ring"))?;
        let target_id = new_id.map(ObjectId).unwrap_or(id);

        if let Some(ring) = &ring {
            stack.insert_at_ring(ring, target_id, record.data).await?;
            println!("reinserted {id} as {target_id} into ring {ring}");
        } else {
            stack.insert_at(target_id, record.data).await?;
            println!("reinserted {id} as {target_id}");
        }
    }
    Ok(())
}

fn handle_create_cluster(manifest: &Path) -> Result<()> {
    let text = std::fs::read_to_string(manifest).with_context(|| format!("reading {}", manifest.display()))?;
    let _: serde_json::Value = serde_yaml_like_json(&text)?;
    println!("manifest {} parses; cluster provisioning is not implemented", manifest.display());
    Ok(())
}

fn serde_yaml_like_json(text: &str) -> Result<serde_json::Value> {
    serde_json::from_str(text).or_else(|_| {
        serde_yaml::from_str(text).map_err(|e| anyhow::anyhow!("manifest is neither valid JSON nor YAML: {e}"))
    })
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reinsert_round_trips_a_record_under_a_new_id() {
        let config = RuntimeConfig::test_config();
        let stack = RingStack::new(build_rings(&config));
        let original = stack.insert(r#"{"id":1}"#.to_string()).await.unwrap();

        handle_reinsert(&stack, vec![original.id.0], Some(999), None).await.unwrap();

        assert!(stack.select(original.id).await.unwrap().is_some());
        let moved = stack.select(ObjectId(999)).await.unwrap().unwrap();
        assert_eq!(moved.data, original.data);
    }

    #[tokio::test]
    async fn reinsert_with_new_id_rejects_more_than_one_source_id() {
        let config = RuntimeConfig::test_config();
        let stack = RingStack::new(build_rings(&config));
        let err = handle_reinsert(&stack, vec![1, 2], Some(3), None).await.unwrap_err();
        assert!(err.to_string().contains("exactly one id"));
    }

    #[tokio::test]
    async fn reinsert_of_an_unknown_id_fails() {
        let config = RuntimeConfig::test_config();
        let stack = RingStack::new(build_rings(&config));
        let err = handle_reinsert(&stack, vec![404], None, None).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn reinsert_with_ring_targets_the_named_ring_directly() {
        let mut config = RuntimeConfig::test_config();
        config.rings.push(schemat_runtime::RingConfig { name: "secondary".into(), read_only: false });
        let stack = RingStack::new(build_rings(&config));
        let original = stack.insert(r#"{"id":1}"#.to_string()).await.unwrap();

        handle_reinsert(&stack, vec![original.id.0], None, Some("secondary".into())).await.unwrap();

        let moved = stack.select(original.id).await.unwrap().unwrap();
        assert_eq!(moved.ring, "primary"); // select hits the top-down first match, still primary
    }
}

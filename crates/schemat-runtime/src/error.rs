//! Errors raised while booting or operating one worker process.

use thiserror::Error;

use schemat_types::ObjectId;

/// Errors raised by the runtime adapter (spec §7, composing every
/// subsystem's own typed error into one at the process boundary).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The config file could not be read or did not parse as YAML.
    #[error("runtime configuration error: {0}")]
    Configuration(String),

    /// No node id file was found and none was supplied.
    #[error("no node id available: {0}")]
    MissingNodeId(String),

    /// The object named as this worker's Node could not be resolved to
    /// a class (spec §4.H: the scheduler reads desired agents off a
    /// Node object).
    #[error("no class registered for category {0}")]
    UnknownClass(ObjectId),

    /// The registry rejected a load or commit.
    #[error(transparent)]
    Registry(#[from] schemat_registry::RegistryError),

    /// A staged edit or commit was rejected.
    #[error(transparent)]
    Transaction(#[from] schemat_transaction::TransactionError),

    /// An RPC call failed.
    #[error(transparent)]
    Rpc(#[from] schemat_rpc::RpcError),

    /// A property read or write failed.
    #[error(transparent)]
    Object(#[from] schemat_object::ObjectError),
}

/// Convenience alias.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

//! RPC error taxonomy (spec §4.I: "timeout, target-not-resident,
//! method-not-found, remote-exception").

use thiserror::Error;

use schemat_types::ObjectId;

/// Failure modes of an `$role.method()` call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    /// No reply arrived before `request_timeout` elapsed.
    #[error("rpc call timed out")]
    Timeout,

    /// The target agent is not running anywhere this caller could
    /// reach (neither locally resident nor bus-publishable).
    #[error("target {0} is not resident")]
    TargetNotResident(ObjectId),

    /// The role/method pair has no handler on the dispatched instance.
    #[error("no method `{method}` on role `{role}`")]
    MethodNotFound {
        /// Role the call was addressed to.
        role: String,
        /// Method name that was not found.
        method: String,
    },

    /// The peer (local dispatcher or remote worker) raised while
    /// handling the call. Remote exceptions cross the bus as a string,
    /// so only the message survives (spec §7 `RemoteError`: "preserves
    /// message, stack, cause" — stack/cause are peer-local concepts this
    /// transport does not carry).
    #[error("remote error: {0}")]
    RemoteError(String),

    /// The bus rejected the publish outright.
    #[error("rpc publish failed: {0}")]
    PublishFailed(String),
}

/// Convenience alias.
pub type RpcResult<T> = Result<T, RpcError>;

//! The wire shape of an `$role.method()` call (spec §4.I: "a message
//! `{target: obj.id, role, method, args}`").

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schemat_types::{NodeId, ObjectId};

/// A request/reply pair published on a node's bus topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RpcEnvelope {
    /// `obj.$role.method(args)`, addressed to `target`.
    Request {
        /// Correlates this request with its eventual reply.
        correlation_id: Uuid,
        /// Object the call targets.
        target: ObjectId,
        /// Role name (without the leading `$`).
        role: String,
        /// Method being invoked on the role.
        method: String,
        /// Call arguments, opaque to the transport.
        args: serde_json::Value,
        /// Node the caller is listening on for the reply.
        reply_to: NodeId,
    },
    /// The outcome of a previously published [`RpcEnvelope::Request`].
    Reply {
        /// Matches the request's `correlation_id`.
        correlation_id: Uuid,
        /// `Ok(value)` on success, `Err(message)` on failure — peer-side
        /// errors cross the wire as a message only (spec §7).
        result: Result<serde_json::Value, String>,
    },
}

//! Shared error taxonomy (spec §7).
//!
//! Every crate above `schemat-types` converts its own errors into
//! [`SchematError`] at its public boundary so callers can match on `kind`
//! instead of parsing strings, while still being able to use `anyhow`
//! freely inside implementations (spec §10).

use thiserror::Error;

use crate::ids::ObjectId;

/// The canonical error taxonomy produced anywhere in the object runtime.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchematError {
    /// Property access on a stub whose data has not been fetched yet.
    /// Recoverable by awaiting `load()`.
    #[error("object {0} is not loaded")]
    NotLoaded(ObjectId),

    /// Endpoint or target resolution failed; surfaced as an HTTP 404 at
    /// the (out of scope) edge server.
    #[error("URL target not found: {0}")]
    UrlNotFound(String),

    /// A schema violation was detected during `validate()`.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The `if_version` guard failed at commit time.
    #[error("version conflict on object {object}: expected {expected}, found {found}")]
    VersionConflict {
        /// Object whose version changed underneath the transaction.
        object: ObjectId,
        /// Version the transaction expected.
        expected: u64,
        /// Version actually present in storage.
        found: u64,
    },

    /// Storage returned no record for an id.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// A deadline was exceeded in a request handler or RPC call.
    #[error("operation timed out")]
    ServerTimeout,

    /// An RPC call raised at the peer; message/cause are preserved.
    #[error("remote error: {0}")]
    RemoteError(String),

    /// A category's required `__seal` does not name a version the loader
    /// can materialize (spec §9, open question: seal semantics).
    #[error("seal mismatch for object {object}: {detail}")]
    SealMismatch {
        /// Object whose seal could not be satisfied.
        object: ObjectId,
        /// Human-readable detail of the mismatch.
        detail: String,
    },

    /// An object declared more than one `__category` reference, which the
    /// schema-merge rule does not support yet (spec §9, open question).
    #[error("multiple categories are not supported for object {0}")]
    MultiCategoryUnsupported(ObjectId),
}

/// Convenience alias used throughout the runtime crates.
pub type SchematResult<T> = Result<T, SchematError>;

//! Storage-layer errors (spec §4.F/§6).

use thiserror::Error;

use schemat_types::ObjectId;

/// Errors a [`crate::RingStore`] implementation may raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No record exists for the given id in this ring.
    #[error("no record for {0} in this ring")]
    NotFound(ObjectId),

    /// This ring is read-only and does not accept writes directly; the
    /// caller (or a `RingStack`) should retry against the next ring up.
    #[error("ring {0} is read-only")]
    ReadOnly(String),

    /// The backend rejected the write for a reason outside the object
    /// model (serialization failure, I/O error, etc).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience alias.
pub type StorageResult<T> = Result<T, StorageError>;

//! Registry and loader errors (spec §4.F).

use thiserror::Error;

use schemat_types::ObjectId;

/// Errors raised while loading or decoding a record into an object.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// No ring in the underlying store holds a record for this id.
    #[error("no record for {0} in any ring")]
    NotFound(ObjectId),

    /// The backing ring store rejected the read.
    #[error(transparent)]
    Storage(#[from] schemat_store::StorageError),

    /// The record's `data` column is not valid Catalog-encoded JSON.
    #[error("malformed record for {0}: {1}")]
    Malformed(ObjectId, String),

    /// The object itself rejected the loaded state.
    #[error(transparent)]
    Object(#[from] schemat_object::ObjectError),

    /// A concurrent loader for the same id failed; this caller observed
    /// that failure via the shared in-flight promise.
    #[error("concurrent load of {0} failed: {1}")]
    ConcurrentLoadFailed(ObjectId, String),
}

/// Convenience alias.
pub type RegistryResult<T> = Result<T, RegistryError>;

//! Transaction and commit errors (spec §4.G, §7).

use thiserror::Error;

use schemat_types::ObjectId;

/// Errors raised while staging edits or committing a transaction.
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    /// The twin being committed carries no identity at all (should be
    /// unreachable — every twin is either newborn with a provisional id
    /// or mutated from a loaded object with a committed one).
    #[error("staged object has no id")]
    MissingId,

    /// A twin was staged without ever having been loaded.
    #[error("staged object {0} has no data to commit")]
    NotLoaded(ObjectId),

    /// `if_version` guard failed: the server-side object has moved on
    /// past the version the twin was forked from (spec §8 scenario 6).
    #[error("version conflict on {id}: expected {expected}, server is at {actual}")]
    VersionConflict {
        /// Object whose commit was rejected.
        id: ObjectId,
        /// Version the twin was derived from.
        expected: u64,
        /// Version currently recorded by the registry.
        actual: u64,
    },

    /// A twin in some lifecycle other than `Newborn`/`MutableClone` was
    /// staged; only those two are ever committable.
    #[error("object {0} is not in a committable lifecycle state")]
    NotEditable(ObjectId),

    /// The registry rejected a read or write during commit.
    #[error(transparent)]
    Registry(#[from] schemat_registry::RegistryError),
}

/// Convenience alias.
pub type TransactionResult<T> = Result<T, TransactionError>;

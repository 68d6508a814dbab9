//! Schema and validation errors (spec §4.B).

use thiserror::Error;

/// Errors raised by [`crate::Type::validate`] and the inheritance-merge
/// pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// The value's runtime shape does not match the type family.
    #[error("wrong type for field {field}: expected {expected}, got {actual}")]
    WrongType {
        /// Field name the value was validated against.
        field: String,
        /// Human-readable name of the expected type family.
        expected: String,
        /// Human-readable description of what was actually supplied.
        actual: String,
    },

    /// A required field has no value after inheritance and imputation.
    #[error("missing required field: {0}")]
    MissingRequired(String),

    /// A string, enum, or charset-restricted value failed its
    /// constraint.
    #[error("constraint violated for field {field}: {detail}")]
    ConstraintViolated {
        /// Field name.
        field: String,
        /// Description of the violated constraint.
        detail: String,
    },

    /// A binary-codec operation was attempted on a type family that does
    /// not support index-key encoding.
    #[error("type {0} is not usable in an index key")]
    NotIndexable(String),

    /// The underlying binary codec rejected the value.
    #[error("binary codec error: {0}")]
    Codec(#[from] schemat_types::CodecError),
}

/// Convenience alias.
pub type SchemaResult<T> = Result<T, SchemaError>;

//! Errors raised by property access and edits on a [`crate::WebObject`].

use thiserror::Error;

use schemat_types::ObjectId;

/// Errors raised while reading or writing a [`crate::WebObject`]
/// property.
#[derive(Debug, Error, PartialEq)]
pub enum ObjectError {
    /// A property was read before `load()` populated the object's data
    /// (spec §3 invariant).
    #[error("object {0} is not loaded")]
    NotLoaded(ObjectId),

    /// The object carries no schema and the field is not a reserved
    /// slot, so there is nothing to resolve it against.
    #[error("no schema available to resolve field {0}")]
    NoSchema(String),

    /// A field declared `immutable=true` was targeted by an edit.
    #[error("field {0} is immutable")]
    Immutable(String),

    /// An edit was issued outside of a transaction against an instance
    /// that is not a mutable twin (spec §9 open question: mandatory
    /// transaction promotion).
    #[error("object {0} is immutable outside of a transaction")]
    RequiresTransaction(ObjectId),

    /// Validation failed while resolving or writing a field.
    #[error(transparent)]
    Schema(#[from] schemat_schema::SchemaError),

    /// The underlying catalog rejected a structural edit.
    #[error(transparent)]
    Catalog(#[from] schemat_catalog::CatalogError),
}

/// Convenience alias.
pub type ObjectResult<T> = Result<T, ObjectError>;

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-object** – the web object core: identity, lifecycle,
//! schema-driven property access, and the per-twin edit log
//! (spec §4.E).

mod class;
mod error;
mod lifecycle;
mod object;
mod role;

pub use class::{AncestorSource, GetterOutcome, NoAncestors, ObjectClass};
pub use error::{ObjectError, ObjectResult};
pub use lifecycle::{Cached, Lifecycle};
pub use object::{WebObject, FIELD_CATEGORY, FIELD_ID, FIELD_SEAL, FIELD_VERSION};
pub use role::{is_role_access, parse_role, RoleHandle};

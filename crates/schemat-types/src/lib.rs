#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-types** – Identifiers, binary codec, and error taxonomy for
//! the Schemat core object runtime.
//!
//! This crate is dependency-light and sits at the bottom of the crate
//! graph: every other crate in the workspace depends on it, so it makes
//! no assumptions about storage, networking, or serialization frameworks
//! beyond `serde`.

mod codec;
mod error;
mod ids;

pub use codec::{
    compare_bin, decode_i64_adaptive, decode_i64_fixed, decode_u64_adaptive,
    encode_i64_adaptive, encode_i64_fixed, encode_u64_adaptive, fnv1a_32, CodecError,
};
pub use error::{SchematError, SchematResult};
pub use ids::{NodeId, ObjectId, WorkerId};

/// Convenient prelude for importing the most common types.
pub mod prelude {
    pub use super::{
        compare_bin, NodeId, ObjectId, SchematError, SchematResult, WorkerId,
    };
}

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-jsonx** – reversible encoding of arbitrary object graphs to
//! plain JSON via reserved class tags (spec §4.C).
//!
//! [`codec::encode`]/[`codec::decode`] handle the ordinary owned-tree
//! case; [`registry::encode_graph`] handles the rarer case of
//! custom-class instances linked by shared pointers, where a genuine
//! cycle is possible and must be rejected rather than recursed into
//! forever.

mod codec;
mod registry;
mod value;

pub use codec::{decode, encode, JsonxError};
pub use registry::{encode_graph, ClassRegistry, Encodable, GraphError, GraphField};
pub use value::JsonxValue;

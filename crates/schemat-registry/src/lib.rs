#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-registry** – the process-wide `id -> object` cache and
//! loader, with TTL eviction, load-once deduplication, and version
//! tracking (spec §4.F).

mod error;
mod registry;
mod ttl;

pub use error::{RegistryError, RegistryResult};
pub use registry::Registry;
pub use ttl::{DefaultTtlPolicy, TtlPolicy};

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-store** – the storage trait every ring backend implements,
//! plus the ring-stacking write/read policy (spec §4.F, §6).

mod error;
mod record;
mod ring;

pub use error::{StorageError, StorageResult};
pub use record::Record;
pub use ring::{RingStack, RingStore, ScanParams};

//! Identifiers shared across the whole object runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a web object.
///
/// Non-negative values are committed IDs assigned by the storage layer;
/// negative values are provisional IDs (`__index_id`) handed out to
/// newborn objects so references can be encoded before the object is
/// committed (spec §3, Glossary: "Provisional ID"). IDs are immutable once
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl ObjectId {
    /// Whether this ID denotes a committed object (`id >= 0`).
    pub fn is_committed(self) -> bool {
        self.0 >= 0
    }

    /// Whether this ID is a provisional, not-yet-committed newborn ID.
    pub fn is_provisional(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Worker process index within a node; `0` denotes the master process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// The master process.
    pub const MASTER: WorkerId = WorkerId(0);

    /// Whether this is the master process.
    pub fn is_master(self) -> bool {
        self.0 == 0
    }
}

/// Identity of a cluster node, as read from the node-id file (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! The canonical persisted form of a web object (spec §3 "Record").

use schemat_types::ObjectId;

/// A persisted `(id, data)` pair, tagged with the ring it was last
/// durably written to (SPEC_FULL.md §3: "every record additionally
/// carries the name of the ring it was last durably written to").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Object identity. Always committed (non-negative) once a record
    /// exists in storage.
    pub id: ObjectId,
    /// JSONx-encoded properties, as produced by `schemat-jsonx`.
    pub data: String,
    /// Name of the ring this record currently lives in.
    pub ring: String,
}

impl Record {
    /// Construct a record for a freshly-written ring.
    pub fn new(id: ObjectId, data: impl Into<String>, ring: impl Into<String>) -> Self {
        Self { id, data: data.into(), ring: ring.into() }
    }
}

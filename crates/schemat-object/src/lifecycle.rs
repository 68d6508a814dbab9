//! Object lifecycle states and the per-field cache sentinel (spec §3
//! "Lifecycle", §9 "Reserved sentinel").

/// Where an object sits in its lifecycle (spec §4.E).
///
/// ```text
/// STUB ── load() ──▶ LOADING ── on-success ──▶ LOADED ── ttl expires ──▶ STUB (evicted)
///                           └─ on-error ──▶ STUB (data cleared)
/// NEWBORN ── save() ──▶ LOADED (id assigned)
/// LOADED ── mutate() ──▶ MUTABLE_CLONE
/// MUTABLE_CLONE ── save() ──▶ (edits flushed, reloaded LOADED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Has an id, no data loaded yet.
    Stub,
    /// A load is in flight; concurrent callers share it.
    Loading,
    /// Data present, class resolved, ready for property access.
    Loaded,
    /// Has data but no id yet; staged for insertion.
    Newborn,
    /// A per-transaction clone of a loaded object, open for edits.
    MutableClone,
    /// Removed from the registry past its TTL.
    Evicted,
}

/// A cached field value, distinguishing "never computed" (absence from
/// the cache map) from "computed, and the result was empty" — the
/// sentinel spec.md §9 requires a dedicated tagged variant for rather
/// than reusing `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    /// The field resolved to this list of values.
    Present(T),
    /// The field was computed and legitimately resolved to no values;
    /// distinct from not having attempted computation at all.
    ComputedUndefined,
}

impl<T> Cached<T> {
    /// The cached values, or an empty default if this is the
    /// "computed undefined" sentinel.
    pub fn into_values(self) -> T
    where
        T: Default,
    {
        match self {
            Cached::Present(v) => v,
            Cached::ComputedUndefined => T::default(),
        }
    }
}

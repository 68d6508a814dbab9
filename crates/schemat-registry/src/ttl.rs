//! TTL imputation policy (spec §4.F: "TTL is imputed from the object's
//! category (`cache_timeout`) or from its source ring").

use std::time::Duration;

use schemat_types::ObjectId;

/// Decides how long a freshly-loaded object should live in the cache
/// before it becomes eligible for the lazy TTL sweep.
///
/// Resolving a category's own `cache_timeout` field requires walking
/// the schema-driven property computation of a *second* object (the
/// category itself), which only the layer wiring registry, object, and
/// schema together can do; this crate takes the resolved duration as
/// input rather than performing that resolution itself, so a `Registry`
/// can be exercised without a live schema.
pub trait TtlPolicy: Send + Sync {
    /// Duration a record loaded from `ring`, belonging to `category`,
    /// should be cached for. `None` means "never expires".
    fn ttl_for(&self, ring: &str, category: Option<ObjectId>) -> Option<Duration>;
}

/// Bootstrap records get TTL=0, so every access past the loading tick
/// is already stale. Everything else falls back to a fixed default
/// until a category-aware resolver is wired in.
pub struct DefaultTtlPolicy {
    /// TTL applied to records not sourced from a ring named
    /// [`DefaultTtlPolicy::BOOTSTRAP_RING`].
    pub default_ttl: Duration,
}

impl DefaultTtlPolicy {
    /// Ring name treated as the bootstrap ring (TTL=0).
    pub const BOOTSTRAP_RING: &'static str = "bootstrap";

    /// A policy with the given default TTL for non-bootstrap records.
    pub fn new(default_ttl: Duration) -> Self {
        Self { default_ttl }
    }
}

impl Default for DefaultTtlPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl TtlPolicy for DefaultTtlPolicy {
    fn ttl_for(&self, ring: &str, _category: Option<ObjectId>) -> Option<Duration> {
        if ring == Self::BOOTSTRAP_RING {
            Some(Duration::ZERO)
        } else {
            Some(self.default_ttl)
        }
    }
}

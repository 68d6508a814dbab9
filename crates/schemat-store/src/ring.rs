//! The `RingStore` trait and ring-stacking write policy (spec §4.F/§6,
//! Glossary: "Ring").

use async_trait::async_trait;
use tracing::debug;

use schemat_types::ObjectId;

use crate::error::{StorageError, StorageResult};
use crate::record::Record;

/// Parameters accepted by [`RingStore::scan`] (spec §6: `scan(index,
/// {start, stop, limit, reverse})`).
///
/// `index` names which ordering to scan by; a backend that only
/// maintains one (the id order, as [`crate::ring`]'s in-memory backend
/// does) treats `None` and its own index name as equivalent and
/// rejects anything else.
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    /// Index to scan by, or `None` for the backend's default.
    pub index: Option<String>,
    /// Inclusive lower bound on id, if any.
    pub start: Option<ObjectId>,
    /// Inclusive upper bound on id, if any.
    pub stop: Option<ObjectId>,
    /// Maximum number of records to return, if any.
    pub limit: Option<usize>,
    /// Scan in descending id order instead of ascending.
    pub reverse: bool,
}

/// One storage layer, possibly read-only, possibly stacked on another.
/// Implemented per backend (`schemat-store-memory` is the one concrete
/// implementation in this workspace).
#[async_trait]
pub trait RingStore: Send + Sync {
    /// This ring's name, used to tag records written through it.
    fn ring_name(&self) -> &str;

    /// Whether this ring accepts direct writes.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Fetch the record for `id`, if present in this ring.
    async fn select(&self, id: ObjectId) -> StorageResult<Option<Record>>;

    /// Insert a new record, assigning the next id this ring hands out.
    async fn insert(&self, data: String) -> StorageResult<Record>;

    /// Insert a record at a caller-chosen id (used by the CLI's
    /// `reinsert` command, spec §6).
    async fn insert_at(&self, id: ObjectId, data: String) -> StorageResult<Record>;

    /// Overwrite the data for an existing id.
    async fn update(&self, id: ObjectId, data: String) -> StorageResult<Record>;

    /// Remove a record.
    async fn delete(&self, id: ObjectId) -> StorageResult<()>;

    /// List records held by this ring matching `params` (spec §6).
    async fn scan(&self, params: &ScanParams) -> StorageResult<Vec<Record>>;
}

/// A stack of rings, ordered from the primary (first, normally
/// writable) ring to progressively older, possibly read-only rings
/// beneath it. Reads consult rings top-down and stop at the first hit;
/// writes are attempted against the primary ring and propagate upward
/// through the stack if a ring rejects them as read-only.
pub struct RingStack {
    rings: Vec<Box<dyn RingStore>>,
}

impl RingStack {
    /// Build a stack from rings ordered primary-first.
    pub fn new(rings: Vec<Box<dyn RingStore>>) -> Self {
        Self { rings }
    }

    /// Read a record, consulting rings top-down.
    pub async fn select(&self, id: ObjectId) -> StorageResult<Option<Record>> {
        for ring in &self.rings {
            if let Some(record) = ring.select(id).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Insert a new record, propagating up through read-only rings
    /// until a writable one accepts it (Glossary: "writes propagate
    /// upward if the target ring rejects them").
    pub async fn insert(&self, data: String) -> StorageResult<Record> {
        let mut last_err = StorageError::Backend("empty ring stack".into());
        for ring in &self.rings {
            match ring.insert(data.clone()).await {
                Ok(record) => return Ok(record),
                Err(StorageError::ReadOnly(name)) => {
                    debug!(ring = %name, "ring is read-only, propagating write upward");
                    last_err = StorageError::ReadOnly(name);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err)
    }

    /// As [`RingStack::insert`] but at a caller-chosen id.
    pub async fn insert_at(&self, id: ObjectId, data: String) -> StorageResult<Record> {
        let mut last_err = StorageError::Backend("empty ring stack".into());
        for ring in &self.rings {
            match ring.insert_at(id, data.clone()).await {
                Ok(record) => return Ok(record),
                Err(StorageError::ReadOnly(name)) => {
                    debug!(ring = %name, "ring is read-only, propagating write upward");
                    last_err = StorageError::ReadOnly(name);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err)
    }

    /// Overwrite `id`'s data in whichever ring currently holds it,
    /// consulted top-down. A ring that holds the record but rejects the
    /// write as read-only has its update propagated upward the same way
    /// [`RingStack::insert`] propagates a rejected insert.
    pub async fn update(&self, id: ObjectId, data: String) -> StorageResult<Record> {
        for ring in &self.rings {
            match ring.update(id, data.clone()).await {
                Ok(record) => return Ok(record),
                Err(StorageError::NotFound(_)) => continue,
                Err(StorageError::ReadOnly(name)) => {
                    debug!(ring = %name, "ring is read-only, propagating update upward");
                    return self.insert_at(id, data).await;
                }
                Err(other) => return Err(other),
            }
        }
        Err(StorageError::NotFound(id))
    }

    /// Remove `id` from whichever ring currently holds it.
    pub async fn delete(&self, id: ObjectId) -> StorageResult<()> {
        for ring in &self.rings {
            match ring.delete(id).await {
                Ok(()) => return Ok(()),
                Err(StorageError::NotFound(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(StorageError::NotFound(id))
    }

    /// Every record across every ring in the stack matching `params`,
    /// primary first within each ring. `limit` is re-applied across the
    /// concatenated result, since each ring only knows its own records.
    pub async fn scan_all(&self, params: &ScanParams) -> StorageResult<Vec<Record>> {
        let mut all = Vec::new();
        for ring in &self.rings {
            all.extend(ring.scan(params).await?);
        }
        if let Some(limit) = params.limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    /// Name of the primary (first, normally writable) ring.
    pub fn primary_ring_name(&self) -> &str {
        self.rings.first().map(|r| r.ring_name()).unwrap_or("")
    }

    /// Write `id`'s data to exactly the ring named `ring`, bypassing the
    /// usual top-down propagation policy — used by the CLI's `reinsert`
    /// command, which targets a specific ring explicitly (spec §6: "
    /// `reinsert <ids> [--new <id>] [--ring <name>]`").
    pub async fn insert_at_ring(&self, ring: &str, id: ObjectId, data: String) -> StorageResult<Record> {
        let target = self
            .rings
            .iter()
            .find(|r| r.ring_name() == ring)
            .ok_or_else(|| StorageError::Backend(format!("no ring named {ring}")))?;
        target.insert_at(id, data).await
    }
}

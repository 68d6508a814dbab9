#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-store-memory** – an in-memory [`RingStore`], for tests and
//! bootstrap rings (spec §4.F, §6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use schemat_store::{Record, RingStack, RingStore, ScanParams, StorageError, StorageResult};
use schemat_types::ObjectId;

/// An in-memory, non-persistent storage ring.
///
/// Assigns ids from a monotonic counter starting at `1` unless
/// constructed read-only. State lives behind `Arc<RwLock<HashMap<..>>>`,
/// a cheap `Clone` handle safe to share across tasks.
#[derive(Clone)]
pub struct MemoryRing {
    name: String,
    read_only: bool,
    records: Arc<RwLock<HashMap<ObjectId, Record>>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryRing {
    /// A fresh, writable, empty ring named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
            records: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// A read-only ring, typically seeded once at bootstrap and never
    /// written to again directly (spec §4.F: "bootstrap rings are
    /// consulted only during initialization").
    pub fn read_only(name: impl Into<String>, seed: Vec<Record>) -> Self {
        let records = seed.into_iter().map(|r| (r.id, r)).collect();
        Self {
            name: name.into(),
            read_only: true,
            records: Arc::new(RwLock::new(records)),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the ring holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RingStore for MemoryRing {
    fn ring_name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn select(&self, id: ObjectId) -> StorageResult<Option<Record>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, data: String) -> StorageResult<Record> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.name.clone()));
        }
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = Record::new(id, data, self.name.clone());
        self.records.write().await.insert(id, record.clone());
        debug!(ring = %self.name, object = %id, "record inserted");
        Ok(record)
    }

    async fn insert_at(&self, id: ObjectId, data: String) -> StorageResult<Record> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.name.clone()));
        }
        let record = Record::new(id, data, self.name.clone());
        self.records.write().await.insert(id, record.clone());
        debug!(ring = %self.name, object = %id, "record reinserted at explicit id");
        Ok(record)
    }

    async fn update(&self, id: ObjectId, data: String) -> StorageResult<Record> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.name.clone()));
        }
        let mut records = self.records.write().await;
        if !records.contains_key(&id) {
            return Err(StorageError::NotFound(id));
        }
        let record = Record::new(id, data, self.name.clone());
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: ObjectId) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.name.clone()));
        }
        self.records.write().await.remove(&id).ok_or(StorageError::NotFound(id))?;
        Ok(())
    }

    async fn scan(&self, params: &ScanParams) -> StorageResult<Vec<Record>> {
        if let Some(index) = &params.index {
            if index != "id" {
                return Err(StorageError::Backend(format!("index {index} not supported by MemoryRing")));
            }
        }

        let mut records: Vec<Record> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| params.start.map_or(true, |start| r.id >= start))
            .filter(|r| params.stop.map_or(true, |stop| r.id <= stop))
            .cloned()
            .collect();

        records.sort_by_key(|r| r.id);
        if params.reverse {
            records.reverse();
        }
        if let Some(limit) = params.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_select_round_trips() {
        let ring = MemoryRing::new("primary");
        let record = ring.insert("{}".to_string()).await.unwrap();
        let fetched = ring.select(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn read_only_ring_rejects_writes() {
        let ring = MemoryRing::read_only("bootstrap", vec![]);
        let err = ring.insert("{}".to_string()).await.unwrap_err();
        assert_eq!(err, StorageError::ReadOnly("bootstrap".to_string()));
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let ring = MemoryRing::new("primary");
        let err = ring.update(ObjectId(999), "{}".to_string()).await.unwrap_err();
        assert_eq!(err, StorageError::NotFound(ObjectId(999)));
    }

    #[tokio::test]
    async fn delete_then_select_returns_none() {
        let ring = MemoryRing::new("primary");
        let record = ring.insert("{}".to_string()).await.unwrap();
        ring.delete(record.id).await.unwrap();
        assert_eq!(ring.select(record.id).await.unwrap(), None);
    }

    async fn seeded_ring() -> MemoryRing {
        let ring = MemoryRing::new("primary");
        for n in 1..=5 {
            ring.insert_at(ObjectId(n), format!("{{\"n\":{n}}}")).await.unwrap();
        }
        ring
    }

    #[tokio::test]
    async fn scan_defaults_to_every_record_in_ascending_id_order() {
        let ring = seeded_ring().await;
        let ids: Vec<_> = ring.scan(&ScanParams::default()).await.unwrap().into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn scan_honors_start_stop_limit_and_reverse() {
        let ring = seeded_ring().await;
        let params = ScanParams { start: Some(ObjectId(2)), stop: Some(ObjectId(4)), reverse: true, ..Default::default() };
        let ids: Vec<_> = ring.scan(&params).await.unwrap().into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![4, 3, 2]);

        let limited = ScanParams { limit: Some(2), ..Default::default() };
        let ids: Vec<_> = ring.scan(&limited).await.unwrap().into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn scan_rejects_an_unsupported_index() {
        let ring = seeded_ring().await;
        let params = ScanParams { index: Some("by_name".to_string()), ..Default::default() };
        let err = ring.scan(&params).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[tokio::test]
    async fn stack_scan_all_concatenates_rings_and_reapplies_limit() {
        let primary = MemoryRing::new("primary");
        primary.insert_at(ObjectId(1), "{}".to_string()).await.unwrap();
        primary.insert_at(ObjectId(2), "{}".to_string()).await.unwrap();
        let bootstrap = MemoryRing::read_only(
            "bootstrap",
            vec![Record::new(ObjectId(3), "{}".to_string(), "bootstrap".to_string())],
        );
        let stack = RingStack::new(vec![Box::new(primary), Box::new(bootstrap)]);

        let all = stack.scan_all(&ScanParams::default()).await.unwrap();
        let mut ids: Vec<_> = all.iter().map(|r| r.id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        let limited = stack.scan_all(&ScanParams { limit: Some(1), ..Default::default() }).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}

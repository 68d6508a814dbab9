//! Process-wide object cache and loader (spec §4.F).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock as SyncRwLock};
use std::time::Instant;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

use schemat_catalog::Catalog;
use schemat_object::{WebObject, FIELD_CATEGORY, FIELD_SEAL, FIELD_VERSION};
use schemat_store::RingStack;
use schemat_types::ObjectId;

use crate::error::{RegistryError, RegistryResult};
use crate::ttl::TtlPolicy;

struct CacheEntry {
    handle: Arc<SyncRwLock<WebObject>>,
    loaded_at: Instant,
    expire_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|t| now >= t)
    }
}

type LoadPromise = Shared<BoxFuture<'static, Result<(), String>>>;

/// The `id -> {object, loaded_at, expire_at}` cache plus a parallel
/// `id -> pending-load-promise` table (spec §4.F).
///
/// Held as a single `Arc`-backed handle rather than a package-level
/// global, so tests (and multiple nodes within one process) can each
/// instantiate their own registry (spec §9 "avoid package-level
/// globals").
#[derive(Clone)]
pub struct Registry {
    store: Arc<RingStack>,
    ttl_policy: Arc<dyn TtlPolicy>,
    objects: Arc<DashMap<ObjectId, CacheEntry>>,
    inflight: Arc<DashMap<ObjectId, LoadPromise>>,
    versions: Arc<DashMap<ObjectId, Vec<u64>>>,
    next_provisional: Arc<AtomicI64>,
}

impl Registry {
    /// A registry reading through `store`, imputing TTLs via `ttl_policy`.
    pub fn new(store: RingStack, ttl_policy: impl TtlPolicy + 'static) -> Self {
        Self {
            store: Arc::new(store),
            ttl_policy: Arc::new(ttl_policy),
            objects: Arc::new(DashMap::new()),
            inflight: Arc::new(DashMap::new()),
            versions: Arc::new(DashMap::new()),
            next_provisional: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// Hand out a fresh, process-wide-unique provisional id for a
    /// newborn object (spec §3, Glossary "Provisional ID"). Held on the
    /// registry rather than a bare static so each `Registry` instance
    /// (e.g. in parallel tests) allocates from its own counter.
    pub fn next_provisional_id(&self) -> ObjectId {
        ObjectId(self.next_provisional.fetch_sub(1, Ordering::SeqCst))
    }

    /// Insert a brand-new record for a committed newborn object,
    /// caching the result as already loaded. Returns the assigned id
    /// (spec §4.G: "commit returns assigned IDs").
    pub async fn commit_insert(
        &self,
        data: &Catalog,
        category: Option<ObjectId>,
    ) -> RegistryResult<ObjectId> {
        let record = self.store.insert(data.encode().to_string()).await?;
        let handle = self.get_object(record.id);
        handle.write().expect("object lock poisoned").mark_loaded(data.clone(), category, 1, None);
        self.register_version(record.id, 1);
        self.stamp_ttl(record.id, &record.ring, category);
        info!(object = %record.id, "newborn object committed");
        Ok(record.id)
    }

    /// Overwrite the stored record for an existing object at exactly
    /// `new_version`, caching the result as already loaded. Callers
    /// (the transaction commit pipeline) are responsible for the
    /// optimistic-concurrency check before calling this — this method
    /// does not itself compare versions (spec §4.G commit policy).
    pub async fn commit_overwrite(
        &self,
        id: ObjectId,
        data: &Catalog,
        new_version: u64,
        category: Option<ObjectId>,
        seal: Option<String>,
    ) -> RegistryResult<()> {
        let record = self.store.update(id, data.encode().to_string()).await?;
        let handle = self.get_object(id);
        handle.write().expect("object lock poisoned").mark_loaded(data.clone(), category, new_version, seal);
        self.register_version(id, new_version);
        self.stamp_ttl(id, &record.ring, category);
        info!(object = %id, version = new_version, "object overwrite committed");
        Ok(())
    }

    fn stamp_ttl(&self, id: ObjectId, ring: &str, category: Option<ObjectId>) {
        let ttl = self.ttl_policy.ttl_for(ring, category);
        if let Some(mut entry) = self.objects.get_mut(&id) {
            entry.loaded_at = Instant::now();
            entry.expire_at = ttl.map(|d| Instant::now() + d);
        }
    }

    /// Number of live (non-expired) entries currently cached.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn sweep_if_expired(&self, id: ObjectId) {
        let now = Instant::now();
        let expired = self
            .objects
            .get(&id)
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            if let Some((_, entry)) = self.objects.remove(&id) {
                entry
                    .handle
                    .write()
                    .expect("object lock poisoned")
                    .evict();
                debug!(object = %id, "evicted past TTL");
            }
        }
    }

    /// Return the cached instance for `id`, or register and return a
    /// fresh stub if none exists yet.
    pub fn get_object(&self, id: ObjectId) -> Arc<SyncRwLock<WebObject>> {
        self.sweep_if_expired(id);
        if let Some(entry) = self.objects.get(&id) {
            return entry.handle.clone();
        }
        let handle = Arc::new(SyncRwLock::new(WebObject::stub(id)));
        self.objects.insert(
            id,
            CacheEntry { handle: handle.clone(), loaded_at: Instant::now(), expire_at: None },
        );
        handle
    }

    /// Return a loaded instance for `id`, awaiting an in-flight load if
    /// one is already running (spec §4.E: "concurrent load() calls...
    /// share a single in-flight promise").
    pub async fn get_loaded(&self, id: ObjectId) -> RegistryResult<Arc<SyncRwLock<WebObject>>> {
        self.sweep_if_expired(id);
        {
            let handle = self.get_object(id);
            let already_loaded = handle.read().expect("object lock poisoned").data().is_some();
            if already_loaded {
                return Ok(handle);
            }
        }
        if let Some(promise) = self.inflight.get(&id).map(|p| p.clone()) {
            promise
                .await
                .map_err(|message| RegistryError::ConcurrentLoadFailed(id, message))?;
            return Ok(self.get_object(id));
        }
        self.load_record(id).await
    }

    /// Fetch the raw record for `id` and decode it into the cached
    /// instance, deduplicating concurrent loaders via a shared promise
    /// inserted into the registry for the duration of the load.
    pub async fn load_record(&self, id: ObjectId) -> RegistryResult<Arc<SyncRwLock<WebObject>>> {
        let handle = self.get_object(id);
        handle.write().expect("object lock poisoned").mark_loading();

        let this = self.clone();
        let promise: LoadPromise = async move { this.fetch_and_apply(id).await.map_err(|e| e.to_string()) }
            .boxed()
            .shared();
        self.inflight.insert(id, promise.clone());

        let outcome = promise.await;
        self.inflight.remove(&id);

        match outcome {
            Ok(()) => Ok(self.get_object(id)),
            Err(message) => {
                handle.write().expect("object lock poisoned").mark_load_failed();
                Err(RegistryError::ConcurrentLoadFailed(id, message))
            }
        }
    }

    async fn fetch_and_apply(&self, id: ObjectId) -> RegistryResult<()> {
        let record = self.store.select(id).await?.ok_or(RegistryError::NotFound(id))?;
        let json: serde_json::Value = serde_json::from_str(&record.data)
            .map_err(|e| RegistryError::Malformed(id, e.to_string()))?;
        let catalog = Catalog::load(&json).map_err(|e| RegistryError::Malformed(id, e.to_string()))?;

        let version = read_reserved_u64(&catalog, FIELD_VERSION).unwrap_or(0);
        let category = read_reserved_ref(&catalog, FIELD_CATEGORY);
        let seal = read_reserved_string(&catalog, FIELD_SEAL);

        let handle = self.get_object(id);
        handle.write().expect("object lock poisoned").mark_loaded(catalog, category, version, seal);
        self.register_version(id, version);
        self.stamp_ttl(id, &record.ring, category);
        info!(object = %id, version, ring = %record.ring, "record loaded");
        Ok(())
    }

    /// Force a re-fetch and replace the cached object atomically;
    /// mutable clones already taken from the previous instance are
    /// untouched (spec §4.F).
    pub async fn reload(&self, id: ObjectId) -> RegistryResult<Arc<SyncRwLock<WebObject>>> {
        self.objects.remove(&id);
        self.inflight.remove(&id);
        self.load_record(id).await
    }

    /// Record that `version` has been observed for `id`, for later
    /// seal-validated dependency resolution.
    pub fn register_version(&self, id: ObjectId, version: u64) {
        let mut entry = self.versions.entry(id).or_default();
        if !entry.contains(&version) {
            entry.push(version);
            entry.sort_unstable();
        }
    }

    /// Every version of `id` observed so far, ascending.
    pub fn version_history(&self, id: ObjectId) -> Vec<u64> {
        self.versions.get(&id).map(|v| v.clone()).unwrap_or_default()
    }

    /// Best-effort synchronous refresh: returns the newest cached
    /// instance for `id` immediately, and if the cache already holds a
    /// version newer than `local_version`, that's returned as-is;
    /// otherwise a reload is scheduled in the background and the
    /// (possibly stale) current handle is returned without waiting
    /// (spec §4.F: "synchronous best-effort").
    pub fn refresh(&self, id: ObjectId, local_version: u64) -> Arc<SyncRwLock<WebObject>> {
        let handle = self.get_object(id);
        let cached_version = handle.read().expect("object lock poisoned").version();
        if cached_version <= local_version && self.inflight.get(&id).is_none() {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(err) = this.reload(id).await {
                    debug!(object = %id, error = %err, "background refresh failed");
                }
            });
        }
        handle
    }
}

fn read_reserved_u64(catalog: &Catalog, field: &str) -> Option<u64> {
    catalog.get(field).ok().flatten().and_then(|v| v.as_f64()).map(|n| n as u64)
}

fn read_reserved_ref(catalog: &Catalog, field: &str) -> Option<ObjectId> {
    match catalog.get(field).ok().flatten() {
        Some(schemat_catalog::Value::Ref(id)) => Some(*id),
        _ => None,
    }
}

fn read_reserved_string(catalog: &Catalog, field: &str) -> Option<String> {
    catalog.get(field).ok().flatten().and_then(|v| v.as_str()).map(|s| s.to_string())
}

//! Ambient transaction context and commit pipeline (spec §4.G).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock as SyncRwLock};

use tracing::{debug, info};

use schemat_catalog::Catalog;
use schemat_object::{Lifecycle, WebObject};
use schemat_registry::Registry;
use schemat_types::ObjectId;

use crate::error::{TransactionError, TransactionResult};

tokio::task_local! {
    static CURRENT: Arc<Mutex<TxState>>;
}

#[derive(Default)]
struct TxState {
    twins: Vec<Arc<SyncRwLock<WebObject>>>,
}

/// Result of committing a transaction: the real id assigned to each
/// provisional (newborn) id that was part of it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Maps each committed newborn's provisional id to its assigned one.
    pub assigned_ids: HashMap<ObjectId, ObjectId>,
}

/// The ambient, task-local transaction context (spec §4.G: "a
/// transaction is an ambient context (task-local) holding a list of
/// modified records").
///
/// There is no `Transaction` value to hold onto — the context lives on
/// the current async task, entered with [`Transaction::run`] and
/// manipulated through this type's associated functions, mirroring how
/// the object model keeps mutation state on the twin itself rather
/// than in a struct callers must thread through by hand.
pub struct Transaction;

impl Transaction {
    /// Run `body` with a fresh, empty transaction context bound to the
    /// current async task.
    pub async fn run<F, Fut, T>(body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        CURRENT.scope(Arc::new(Mutex::new(TxState::default())), body()).await
    }

    /// Register a twin with the ambient transaction so it is included
    /// in the next [`Transaction::commit`] (spec §4.G step (c)). Called
    /// automatically by [`Transaction::newborn`] and
    /// [`Transaction::mutate`]; exposed directly for twins built by
    /// other means (e.g. restored from a prior partial commit).
    ///
    /// # Panics
    /// Panics if called outside [`Transaction::run`].
    pub fn stage(twin: Arc<SyncRwLock<WebObject>>) {
        CURRENT.with(|state| state.lock().expect("transaction state poisoned").twins.push(twin));
    }

    /// Create a newborn object, staged with the ambient transaction.
    pub fn newborn(registry: &Registry, data: Catalog) -> Arc<SyncRwLock<WebObject>> {
        let provisional = registry.next_provisional_id();
        let handle = Arc::new(SyncRwLock::new(WebObject::newborn(provisional, data)));
        Self::stage(handle.clone());
        handle
    }

    /// Produce a mutable twin of `handle`, staged with the ambient
    /// transaction.
    pub fn mutate(handle: &Arc<SyncRwLock<WebObject>>) -> Arc<SyncRwLock<WebObject>> {
        let twin = handle.read().expect("object lock poisoned").mutate();
        let twin = Arc::new(SyncRwLock::new(twin));
        Self::stage(twin.clone());
        twin
    }

    /// Commit every twin staged so far against `registry`, applying the
    /// commit policy from spec §4.G: newborns are sent as full inserts;
    /// existing objects are overwritten under an `if_version` guard
    /// derived from the twin's own recorded version. A version conflict
    /// aborts the whole commit; twins already written before the
    /// conflict was hit are not rolled back (spec §7: storage errors
    /// roll back the local edit log only when the commit was atomic —
    /// this pipeline commits twin-by-twin, so it isn't).
    pub async fn commit(registry: &Registry) -> TransactionResult<CommitOutcome> {
        let twins = CURRENT.with(|state| {
            std::mem::take(&mut state.lock().expect("transaction state poisoned").twins)
        });

        let mut outcome = CommitOutcome::default();
        for twin in twins {
            let (id, lifecycle, data, version, category) = {
                let guard = twin.read().expect("object lock poisoned");
                (guard.id(), guard.lifecycle(), guard.data().cloned(), guard.version(), guard.category())
            };
            let id = id.ok_or(TransactionError::MissingId)?;

            match lifecycle {
                Lifecycle::Newborn => {
                    let data = data.ok_or(TransactionError::NotLoaded(id))?;
                    let assigned = registry.commit_insert(&data, category).await?;
                    outcome.assigned_ids.insert(id, assigned);
                    debug!(provisional = %id, assigned = %assigned, "newborn committed");
                }
                Lifecycle::MutableClone => {
                    let data = data.ok_or(TransactionError::NotLoaded(id))?;
                    let current = registry.get_loaded(id).await?;
                    let (current_version, seal) = {
                        let guard = current.read().expect("object lock poisoned");
                        (guard.version(), guard.seal().map(str::to_owned))
                    };
                    if current_version != version {
                        return Err(TransactionError::VersionConflict {
                            id,
                            expected: version,
                            actual: current_version,
                        });
                    }
                    registry.commit_overwrite(id, &data, version + 1, category, seal).await?;
                    info!(object = %id, version = version + 1, "commit applied");
                }
                _ => return Err(TransactionError::NotEditable(id)),
            }
        }
        Ok(outcome)
    }
}

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-transaction** – the ambient, task-local transaction
//! context and the edit commit pipeline that turns staged mutable
//! twins into ring-store writes (spec §4.G).

mod error;
mod transaction;

pub use error::{TransactionError, TransactionResult};
pub use transaction::{CommitOutcome, Transaction};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use schemat_catalog::{Catalog, Value};
    use schemat_object::{GetterOutcome, ObjectClass, WebObject};
    use schemat_registry::{DefaultTtlPolicy, Registry};
    use schemat_schema::Schema;
    use schemat_store::RingStack;
    use schemat_store_memory::MemoryRing;
    use schemat_types::ObjectId;

    use super::*;

    struct OpenClass {
        schema: Schema,
    }

    impl OpenClass {
        fn new() -> Self {
            Self { schema: Schema::new(vec![], false) }
        }
    }

    impl ObjectClass for OpenClass {
        fn classpath(&self) -> &str {
            "test.Open"
        }

        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn invoke_getter(&self, _field: &str, _obj: &WebObject) -> Option<GetterOutcome> {
            None
        }
    }

    fn registry() -> Registry {
        let ring = MemoryRing::new("primary");
        let stack = RingStack::new(vec![Box::new(ring)]);
        Registry::new(stack, DefaultTtlPolicy::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn commit_of_a_newborn_assigns_a_real_id() {
        let registry = registry();
        let class = OpenClass::new();

        let outcome = Transaction::run(|| async {
            let twin = Transaction::newborn(&registry, Catalog::new());
            twin.write().unwrap().set_field("name", Value::String("node-1".into()), &class).unwrap();
            Transaction::commit(&registry).await
        })
        .await
        .unwrap();

        assert_eq!(outcome.assigned_ids.len(), 1);
        let (provisional, assigned) = outcome.assigned_ids.iter().next().unwrap();
        assert!(provisional.is_provisional());
        assert!(assigned.is_committed());

        let loaded = registry.get_loaded(*assigned).await.unwrap();
        let guard = loaded.read().unwrap();
        assert_eq!(guard.get_field("name", &class).unwrap(), Some(Value::String("node-1".into())));
    }

    async fn seed_object(registry: &Registry) -> ObjectId {
        Transaction::run(|| async {
            let _twin = Transaction::newborn(registry, Catalog::new());
            Transaction::commit(registry).await
        })
        .await
        .unwrap()
        .assigned_ids
        .into_values()
        .next()
        .unwrap()
    }

    #[tokio::test]
    async fn commit_of_a_mutated_twin_bumps_the_version() {
        let registry = registry();
        let class = OpenClass::new();
        let assigned = seed_object(&registry).await;

        let handle = registry.get_loaded(assigned).await.unwrap();
        Transaction::run(|| async {
            let twin = Transaction::mutate(&handle);
            twin.write().unwrap().set_field("name", Value::String("renamed".into()), &class).unwrap();
            Transaction::commit(&registry).await
        })
        .await
        .unwrap();

        let guard = handle.read().unwrap();
        assert_eq!(guard.version(), 2);
        assert_eq!(guard.get_field("name", &class).unwrap(), Some(Value::String("renamed".into())));
    }

    #[tokio::test]
    async fn stale_version_guard_is_rejected_as_a_conflict() {
        let registry = registry();
        let class = OpenClass::new();
        let assigned = seed_object(&registry).await;
        let handle = registry.get_loaded(assigned).await.unwrap();

        // Two independent twins, both forked from the same version=1
        // snapshot, before either has committed.
        let twin_a = Transaction::run(|| async { Transaction::mutate(&handle) }).await;
        let twin_b = Transaction::run(|| async { Transaction::mutate(&handle) }).await;
        twin_a.write().unwrap().set_field("name", Value::String("a-wins".into()), &class).unwrap();
        twin_b.write().unwrap().set_field("name", Value::String("b-loses".into()), &class).unwrap();

        // Twin A commits first, bumping the server-side version to 2.
        Transaction::run(|| async {
            Transaction::stage(twin_a.clone());
            Transaction::commit(&registry).await
        })
        .await
        .unwrap();

        // Twin B still carries `if_version(1)`; the server is now at 2,
        // so its commit must be rejected (spec §8 scenario 6).
        let err = Transaction::run(|| async {
            Transaction::stage(twin_b.clone());
            Transaction::commit(&registry).await
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            TransactionError::VersionConflict { id: assigned, expected: 1, actual: 2 },
        );
    }
}

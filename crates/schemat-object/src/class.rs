//! The hooks a concrete object class supplies: its schema, registered
//! getters, and impute methods (spec §4.B, §4.E).

use schemat_catalog::Value;
use schemat_schema::Schema;

use crate::object::WebObject;

/// What a registered getter produced for a property read.
pub enum GetterOutcome {
    /// Cache this value under the property name.
    Cache(Value),
    /// Return this value but do not cache it (spec §4.E point 3: "cache
    /// unless a no-cache marker is returned").
    NoCache(Value),
    /// The getter explicitly has nothing to return; cache the
    /// "already computed as undefined" sentinel.
    ComputedUndefined,
}

/// Supplies the schema and behavioral hooks for one object class.
/// Implemented by generated or hand-written category bindings; the
/// runtime resolves an object's class from its `__category` reference.
pub trait ObjectClass: Send + Sync {
    /// Dotted classpath, used by JSONx to tag encoded instances.
    fn classpath(&self) -> &str;

    /// The field schema instances of this class validate against.
    fn schema(&self) -> &Schema;

    /// Invoke the registered getter for `field`, if any.
    fn invoke_getter(&self, field: &str, obj: &WebObject) -> Option<GetterOutcome>;

    /// Invoke the named impute method with no arguments.
    fn invoke_impute(&self, _method: &str, _obj: &WebObject) -> Option<Value> {
        None
    }
}

/// Supplies a field's already-resolved per-ancestor value arrays so
/// [`WebObject`] does not need to depend on the registry to walk a
/// prototype chain itself (spec §9 "Prototype chain & C3 linearization":
/// the linearization is computed once and handed in, not re-derived).
pub trait AncestorSource {
    /// Return, in priority order (closest prototype first, category
    /// defaults last), each ancestor's resolved values for `field`.
    fn ancestor_values(&self, field: &str) -> Vec<Vec<Value>>;
}

/// An [`AncestorSource`] with no ancestors, for standalone objects and
/// tests.
pub struct NoAncestors;

impl AncestorSource for NoAncestors {
    fn ancestor_values(&self, _field: &str) -> Vec<Vec<Value>> {
        Vec::new()
    }
}

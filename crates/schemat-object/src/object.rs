//! The [`WebObject`] core: identity, lifecycle, and schema-driven
//! property access (spec §4.E).

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use schemat_catalog::{Catalog, Edit, Value};
use schemat_schema::ImputeHost;
use schemat_types::ObjectId;

use crate::class::{AncestorSource, GetterOutcome, NoAncestors, ObjectClass};
use crate::error::{ObjectError, ObjectResult};
use crate::lifecycle::{Cached, Lifecycle};

/// Name of the identity slot.
pub const FIELD_ID: &str = "id";
/// Name of the version slot.
pub const FIELD_VERSION: &str = "__ver";
/// Name of the category-reference slot.
pub const FIELD_CATEGORY: &str = "__category";
/// Name of the seal slot.
pub const FIELD_SEAL: &str = "__seal";

fn is_reserved(field: &str) -> bool {
    matches!(field, FIELD_ID | FIELD_VERSION | FIELD_CATEGORY | FIELD_SEAL)
}

fn is_internal(field: &str) -> bool {
    field.starts_with('_') && !is_reserved(field)
}

/// The core object model: an identity, a lifecycle state, a `Catalog` of
/// own data, and a per-field cache of resolved (possibly inherited)
/// values.
#[derive(Debug)]
pub struct WebObject {
    id: Option<ObjectId>,
    lifecycle: Lifecycle,
    data: Option<Catalog>,
    category: Option<ObjectId>,
    version: u64,
    seal: Option<String>,
    cache: RwLock<HashMap<String, Cached<Vec<Value>>>>,
    edit_log: Vec<Edit>,
}

impl WebObject {
    /// A stub: identity known, data not yet loaded.
    pub fn stub(id: ObjectId) -> Self {
        Self {
            id: Some(id),
            lifecycle: Lifecycle::Stub,
            data: None,
            category: None,
            version: 0,
            seal: None,
            cache: RwLock::new(HashMap::new()),
            edit_log: Vec::new(),
        }
    }

    /// A newborn object: data known, identity provisional, staged for
    /// insertion.
    pub fn newborn(provisional_id: ObjectId, data: Catalog) -> Self {
        debug_assert!(provisional_id.is_provisional());
        Self {
            id: Some(provisional_id),
            lifecycle: Lifecycle::Newborn,
            data: Some(data),
            category: None,
            version: 0,
            seal: None,
            cache: RwLock::new(HashMap::new()),
            edit_log: Vec::new(),
        }
    }

    /// Transition a stub or reloading instance into `Loaded`, installing
    /// fetched data.
    pub fn mark_loaded(&mut self, data: Catalog, category: Option<ObjectId>, version: u64, seal: Option<String>) {
        self.data = Some(data);
        self.category = category;
        self.version = version;
        self.seal = seal;
        self.lifecycle = Lifecycle::Loaded;
        self.cache.write().expect("object cache lock poisoned").clear();
        debug!(object = ?self.id, "object loaded");
    }

    /// Begin a load: marks the instance `Loading` so concurrent readers
    /// can detect and await the same in-flight fetch (spec §4.E,
    /// §4.F "in-flight load promise table" is the registry's job; this
    /// just records the local state transition).
    pub fn mark_loading(&mut self) {
        self.lifecycle = Lifecycle::Loading;
    }

    /// Revert to `Stub` after a failed load, clearing any partial data
    /// (spec §7 propagation policy: "the partially-populated object has
    /// its data cleared so a subsequent load() can retry").
    pub fn mark_load_failed(&mut self) {
        self.data = None;
        self.lifecycle = Lifecycle::Stub;
        self.cache.write().expect("object cache lock poisoned").clear();
    }

    /// Evict this instance past its TTL; any surviving reference now
    /// behaves like a fresh stub.
    pub fn evict(&mut self) {
        self.data = None;
        self.lifecycle = Lifecycle::Evicted;
        self.cache.write().expect("object cache lock poisoned").clear();
    }

    /// Produce a mutable twin: a clone open for edits, sharing no
    /// mutable sub-state with `self` (spec §3 invariant).
    pub fn mutate(&self) -> Self {
        Self {
            id: self.id,
            lifecycle: Lifecycle::MutableClone,
            data: self.data.clone(),
            category: self.category,
            version: self.version,
            seal: self.seal.clone(),
            cache: RwLock::new(HashMap::new()),
            edit_log: Vec::new(),
        }
    }

    /// This instance's id, if assigned (provisional or committed).
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The `__ver` slot.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The single `__category` reference (spec §9 open question:
    /// multi-category objects are unsupported for now).
    pub fn category(&self) -> Option<ObjectId> {
        self.category
    }

    /// Read-only access to the backing Catalog, if loaded.
    pub fn data(&self) -> Option<&Catalog> {
        self.data.as_ref()
    }

    /// The `__seal` slot.
    pub fn seal(&self) -> Option<&str> {
        self.seal.as_deref()
    }

    /// Edits accumulated on this twin, ready for the transaction layer
    /// to commit (spec §4.G).
    pub fn edit_log(&self) -> &[Edit] {
        &self.edit_log
    }

    fn require_loaded(&self) -> ObjectResult<&Catalog> {
        self.data.as_ref().ok_or_else(|| ObjectError::NotLoaded(self.id.unwrap_or(ObjectId(0))))
    }

    //───────────────────── reads ─────────────────────

    /// Read every value of `field`, applying schema-driven inheritance.
    /// Reserved and internal slots bypass the schema entirely.
    pub fn get_field_all(&self, field: &str, class: &dyn ObjectClass) -> ObjectResult<Vec<Value>> {
        self.get_field_all_with(field, class, &NoAncestors)
    }

    /// As [`WebObject::get_field_all`], supplying an explicit
    /// [`AncestorSource`] for the prototype/category chain.
    pub fn get_field_all_with(
        &self,
        field: &str,
        class: &dyn ObjectClass,
        ancestors: &dyn AncestorSource,
    ) -> ObjectResult<Vec<Value>> {
        if let Some(reserved) = self.read_reserved(field) {
            return Ok(reserved);
        }

        if let Some(cached) = self.cache.read().expect("object cache lock poisoned").get(field) {
            return Ok(match cached {
                Cached::Present(values) => values.clone(),
                Cached::ComputedUndefined => Vec::new(),
            });
        }

        if let Some(outcome) = class.invoke_getter(field, self) {
            return Ok(self.apply_getter_outcome(field, outcome));
        }

        let catalog = self.require_loaded()?;
        let schema = class.schema();
        let Some(field_type) = schema.get(field) else {
            if schema.strict {
                return Err(ObjectError::NoSchema(field.to_string()));
            }
            // Open schema: fall back to the object's own raw values,
            // uninherited and unvalidated.
            return Ok(catalog.get_all(field)?.into_iter().cloned().collect());
        };

        let own: Vec<Value> = catalog.get_all(field)?.into_iter().cloned().collect();
        let mut arrays = vec![own];
        arrays.extend(ancestors.ancestor_values(field));

        let host = ClassImputeHost { class, obj: self };
        let resolved = field_type.combine_inherited(field, &arrays, &host)?;

        let mut cache = self.cache.write().expect("object cache lock poisoned");
        cache.insert(
            field.to_string(),
            if resolved.is_empty() { Cached::ComputedUndefined } else { Cached::Present(resolved.clone()) },
        );
        Ok(resolved)
    }

    /// Read the first value of `field`, or `None` if it resolves to no
    /// values (spec §8 testable property: `o.f` equals the first
    /// element of `o.f$`, or undefined iff `o.f$ == []`).
    pub fn get_field(&self, field: &str, class: &dyn ObjectClass) -> ObjectResult<Option<Value>> {
        Ok(self.get_field_all(field, class)?.into_iter().next())
    }

    fn read_reserved(&self, field: &str) -> Option<Vec<Value>> {
        match field {
            FIELD_ID => self.id.map(|id| vec![Value::Ref(id)]),
            FIELD_VERSION => Some(vec![Value::Int(self.version as i64)]),
            FIELD_CATEGORY => self.category.map(|id| vec![Value::Ref(id)]),
            FIELD_SEAL => self.seal.clone().map(|s| vec![Value::String(s)]),
            _ => None,
        }
    }

    fn apply_getter_outcome(&self, field: &str, outcome: GetterOutcome) -> Vec<Value> {
        match outcome {
            GetterOutcome::Cache(value) => {
                let values = Self::spread(value);
                self.cache
                    .write()
                    .expect("object cache lock poisoned")
                    .insert(field.to_string(), Cached::Present(values.clone()));
                values
            }
            GetterOutcome::NoCache(value) => Self::spread(value),
            GetterOutcome::ComputedUndefined => {
                self.cache
                    .write()
                    .expect("object cache lock poisoned")
                    .insert(field.to_string(), Cached::ComputedUndefined);
                Vec::new()
            }
        }
    }

    fn spread(value: Value) -> Vec<Value> {
        match value {
            Value::List(items) => items,
            other => vec![other],
        }
    }

    //───────────────────── writes ─────────────────────

    fn require_editable(&self) -> ObjectResult<()> {
        match self.lifecycle {
            Lifecycle::Newborn | Lifecycle::MutableClone => Ok(()),
            _ => Err(ObjectError::RequiresTransaction(self.id.unwrap_or(ObjectId(0)))),
        }
    }

    /// Write `value` to `field`. Reserved slots go straight to their
    /// backing field; internal (`_xyz`) slots go straight to the
    /// Catalog; everything else is staged as an `Edit::Set` (spec
    /// §4.E "Writes").
    pub fn set_field(&mut self, field: &str, value: Value, class: &dyn ObjectClass) -> ObjectResult<()> {
        match field {
            FIELD_VERSION => {
                if let Value::Int(v) = value {
                    self.version = v as u64;
                }
                return Ok(());
            }
            FIELD_CATEGORY => {
                if let Value::Ref(id) = value {
                    self.category = Some(id);
                }
                return Ok(());
            }
            FIELD_SEAL => {
                if let Value::String(s) = value {
                    self.seal = Some(s);
                }
                return Ok(());
            }
            FIELD_ID => return Ok(()), // immutable once set; silently ignored like the reserved slots it models
            _ => {}
        }

        self.require_editable()?;

        if is_internal(field) {
            let catalog = self.data.get_or_insert_with(Catalog::new);
            catalog.apply(&Edit::Set { path: field.to_string(), value })?;
            return Ok(());
        }

        let schema = class.schema();
        if let Some(field_type) = schema.get(field) {
            if field_type.options.immutable {
                let already_set = self.data.as_ref().and_then(|c| c.get(field).ok().flatten()).is_some();
                if already_set {
                    return Err(ObjectError::Immutable(field.to_string()));
                }
            }
            let validated = field_type.validate(field, &value)?;
            self.stage_edit(Edit::Set { path: field.to_string(), value: validated })?;
        } else if schema.strict {
            return Err(ObjectError::NoSchema(field.to_string()));
        } else {
            self.stage_edit(Edit::Set { path: field.to_string(), value })?;
        }
        Ok(())
    }

    /// Replace every occurrence of `field` with `values` atomically
    /// (spec §4.E "Plural writes").
    pub fn set_field_all(&mut self, field: &str, values: Vec<Value>) -> ObjectResult<()> {
        self.require_editable()?;
        self.stage_edit(Edit::Delete { path: field.to_string() })?;
        for value in values {
            self.stage_edit(Edit::Insert {
                parent: String::new(),
                pos: None,
                key: Some(field.to_string()),
                value,
            })?;
        }
        Ok(())
    }

    fn stage_edit(&mut self, edit: Edit) -> ObjectResult<()> {
        let catalog = self.data.get_or_insert_with(Catalog::new);
        catalog.apply(&edit)?;
        self.edit_log.push(edit);
        self.cache.write().expect("object cache lock poisoned").clear();
        Ok(())
    }
}

struct ClassImputeHost<'a> {
    class: &'a dyn ObjectClass,
    obj: &'a WebObject,
}

impl ImputeHost for ClassImputeHost<'_> {
    fn invoke_impute(&self, method: &str) -> Option<Value> {
        self.class.invoke_impute(method, self.obj)
    }
}

//! Per-field options merged from class defaults and instance overrides
//! (spec §4.B, §3 "Schema").

use schemat_catalog::Value;

/// Source of an imputed value when a field has no own or inherited
/// entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Impute {
    /// A fixed fallback value.
    Default(Value),
    /// The name of a no-argument method on the owning object to call.
    Method(String),
}

/// Options attached to a schema field. Defaults mirror spec.md §3/§4.B:
/// `not_null`/`not_blank` are true unless overridden, everything else is
/// off unless the schema opts in.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOptions {
    /// The field must resolve to at least one value.
    pub required: bool,
    /// The field may carry more than one concrete value.
    pub multiple: bool,
    /// When `multiple`, inherited duplicate values are merged instead of
    /// just concatenated (type-family-specific semantics).
    pub mergeable: bool,
    /// Whether inherited values from prototypes/categories contribute at
    /// all; `false` isolates the field to the object's own entries.
    pub inherited: bool,
    /// Fallback used when no own or inherited value exists.
    pub impute: Option<Impute>,
    /// Name of a registered getter function that computes this field
    /// instead of reading the Catalog directly.
    pub getter: Option<String>,
    /// Alternate field name accepted as a synonym on write.
    pub alias: Option<String>,
    /// Virtual fields are computed and never stored.
    pub is_virtual: bool,
    /// Immutable fields reject edits once set.
    pub immutable: bool,
    /// Editable fields may be changed through the public edit API (as
    /// opposed to only at construction time).
    pub editable: bool,
    /// Reject empty/blank values after validation rather than keeping
    /// them.
    pub not_blank: bool,
    /// Reject `null` after validation.
    pub not_null: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            required: false,
            multiple: false,
            mergeable: false,
            inherited: true,
            impute: None,
            getter: None,
            alias: None,
            is_virtual: false,
            immutable: false,
            editable: true,
            not_blank: true,
            not_null: true,
        }
    }
}

impl FieldOptions {
    /// Whether `value` counts as "blank" under this field's policy
    /// (empty string, empty list, empty catalog, or `Value::Null`).
    pub fn is_blank(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Catalog(c) => c.is_empty(),
            _ => false,
        }
    }
}

//! A `Schema`: the mapping from field name to [`Type`] that a category
//! carries to describe the shape of its instances (spec §3).

use crate::type_::Type;

/// A named field declaration within a [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// Field name.
    pub name: String,
    /// The field's type and options.
    pub field_type: Type,
}

/// A mapping from field name to [`Type`], plus a strict/open flag.
/// Strict schemas reject fields the schema does not declare; open
/// schemas fall back to a generic type for unknown field names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<SchemaField>,
    /// When `true`, field names outside `fields` are rejected rather
    /// than falling back to a generic type.
    pub strict: bool,
}

impl Schema {
    /// Build a schema from an ordered list of `(name, type)` pairs.
    pub fn new(fields: Vec<(String, Type)>, strict: bool) -> Self {
        Self {
            fields: fields.into_iter().map(|(name, field_type)| SchemaField { name, field_type }).collect(),
            strict,
        }
    }

    /// Look up the type declared for `name`.
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.field_type)
    }

    /// Iterate declared fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.iter()
    }

    /// Whether `name` is declared by this schema.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

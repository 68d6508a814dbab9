//! The value domain a [`crate::Catalog`] entry can hold.

use serde::{Deserialize, Serialize};

use schemat_types::ObjectId;

use crate::Catalog;

/// A value stored in a [`Catalog`] entry.
///
/// This is deliberately smaller than a full JSON value: it adds the two
/// domain-specific cases a plain JSON tree cannot express on its own –
/// raw bytes and references to other web objects – while nested catalogs
/// stand in for JSON objects so that duplicate keys and insertion order
/// survive a round trip (spec §4.D).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Value {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Integral number.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Raw byte buffer (encodes via JSONx as a hex-tagged object).
    Bytes(Vec<u8>),
    /// Reference to another web object, by id.
    Ref(ObjectId),
    /// Homogeneous or heterogeneous ordered list.
    List(Vec<Value>),
    /// Nested ordered collection.
    Catalog(Catalog),
}

impl Value {
    /// Read this value as a plain numeric value, if it holds one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Read this value as a string slice, if it holds a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read this value as a nested catalog, if it holds one.
    pub fn as_catalog(&self) -> Option<&Catalog> {
        match self {
            Value::Catalog(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable access to a nested catalog, if this value holds one.
    pub fn as_catalog_mut(&mut self) -> Option<&mut Catalog> {
        match self {
            Value::Catalog(c) => Some(c),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Ref(id)
    }
}

//! The owned value tree JSONx encodes and decodes (spec §4.C).

use schemat_types::ObjectId;

/// An in-memory value in JSONx's domain: everything a plain JSON tree can
/// hold, plus the handful of Schemat-specific cases a class tag is
/// reserved for.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonxValue {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integral number, representable without precision loss as `i64`.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    Array(Vec<JsonxValue>),
    /// A plain (non-tagged) object, field order preserved.
    Object(Vec<(String, JsonxValue)>),
    /// Raw byte buffer; encodes as `{"=": "hex", "@": "bin"}`.
    Bytes(Vec<u8>),
    /// Arbitrary-precision integer carried as a decimal string; encodes
    /// as `{"=": "123...", "@": "bigint"}`.
    BigInt(String),
    /// A reference to a class by dotted path, not an instance of it;
    /// encodes as `{"=": "a.b.C", "@": "class"}`.
    ClassRef(String),
    /// A reference to a web object by id. Non-negative ids name
    /// committed objects; negative ids name provisional (newborn)
    /// objects. Encodes as `{"@": id}`.
    Ref(ObjectId),
    /// An instance of a registered class; encodes as
    /// `{..fields.., "@": "classpath"}`.
    Instance {
        /// Dotted classpath used to resolve a constructor on decode.
        classpath: String,
        /// Field values, in declaration order.
        fields: Vec<(String, JsonxValue)>,
    },
}

impl JsonxValue {
    /// Convenience constructor for a plain object from an iterator of
    /// `(key, value)` pairs.
    pub fn object<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<JsonxValue>,
    {
        JsonxValue::Object(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<i64> for JsonxValue {
    fn from(v: i64) -> Self {
        JsonxValue::Int(v)
    }
}

impl From<f64> for JsonxValue {
    fn from(v: f64) -> Self {
        JsonxValue::Float(v)
    }
}

impl From<bool> for JsonxValue {
    fn from(v: bool) -> Self {
        JsonxValue::Bool(v)
    }
}

impl From<String> for JsonxValue {
    fn from(v: String) -> Self {
        JsonxValue::String(v)
    }
}

impl From<&str> for JsonxValue {
    fn from(v: &str) -> Self {
        JsonxValue::String(v.to_owned())
    }
}

impl From<ObjectId> for JsonxValue {
    fn from(id: ObjectId) -> Self {
        JsonxValue::Ref(id)
    }
}

//! `Type` value objects and the type-family taxonomy (spec §4.B).

use schemat_catalog::Value;
use schemat_types::{compare_bin, ObjectId};

use crate::error::{SchemaError, SchemaResult};
use crate::options::{FieldOptions, Impute};

/// Width of a fixed-length integer encoding, in bytes.
pub type FixedWidth = u8;

/// How an `INTEGER` type lays out its binary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// First byte is the payload length (spec §4.A).
    Adaptive,
    /// Exactly `FixedWidth` bytes, null via a +1 shift.
    Fixed(FixedWidth),
}

/// The family a [`Type`] belongs to, with whatever parameters that
/// family needs (spec §4.B).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// `true`/`false`.
    Boolean,
    /// Any finite floating-point number.
    Number,
    /// Whole number, optionally signed, with a chosen binary layout.
    Integer {
        /// Whether negative values are permitted.
        signed: bool,
        /// Binary encoding strategy.
        width: IntWidth,
    },
    /// General string with optional length bounds.
    String {
        /// Smallest permitted length, inclusive.
        min_len: Option<usize>,
        /// Largest permitted length, inclusive.
        max_len: Option<usize>,
    },
    /// A short identifier restricted to `[A-Za-z0-9_]`.
    Field,
    /// Alias of [`TypeKind::Field`] used for category/type names.
    Identifier,
    /// A string that must look like `scheme://...` or an absolute path.
    Url,
    /// Free-form long text, no length bound.
    Text,
    /// Source code text, tagged with a language hint.
    Code {
        /// Language hint, e.g. `"python"`, `"rust"`.
        language: Option<String>,
    },
    /// Calendar date, stored as an ISO-8601 string.
    Date,
    /// Date and time, stored as an ISO-8601 string.
    DateTime,
    /// Raw byte buffer.
    Binary,
    /// A typed reference to another web object.
    Ref {
        /// Strong references keep their target resident; weak ones
        /// (`strong = false`) may be evicted independently.
        strong: bool,
        /// Whether dereferencing should trigger an automatic load.
        autoload: bool,
    },
    /// One of a fixed set of string variants.
    Enum {
        /// The permitted variant names.
        variants: Vec<String>,
    },
    /// Homogeneous ordered list of a single item type.
    Array(Box<Type>),
    /// Homogeneous unordered collection with unique elements.
    Set(Box<Type>),
    /// Open-ended key/value map with `Value` values (spec: "POJO map").
    Object,
    /// Key/value map with a fixed value type.
    Map(Box<Type>),
    /// A record of named fields, strict (closed) or open.
    Record {
        /// Declared field types, in declaration order.
        fields: Vec<(String, Type)>,
        /// Whether fields outside `fields` are rejected.
        strict: bool,
    },
    /// A tagged union over named variant types.
    Variant(Vec<(String, Type)>),
    /// A type that itself holds another type as its value (used for
    /// schema-of-schema fields).
    Type,
}

/// A field type: a [`TypeKind`] plus the merged [`FieldOptions`] that
/// govern inheritance, imputation, and mutability.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    /// The type family and its parameters.
    pub kind: TypeKind,
    /// Options merged from class defaults and instance overrides.
    pub options: FieldOptions,
}

/// Supplies named impute methods on demand; implemented by the object
/// layer so `Type::impute` can call back into a live instance without
/// this crate depending on `schemat-object`.
pub trait ImputeHost {
    /// Invoke the named zero-argument method and return its result, or
    /// `None` if the method does not exist or declines to produce a
    /// value.
    fn invoke_impute(&self, method: &str) -> Option<Value>;
}

impl Type {
    /// Construct a type with default options.
    pub fn new(kind: TypeKind) -> Self {
        Self { kind, options: FieldOptions::default() }
    }

    /// Builder-style option override.
    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    fn kind_name(&self) -> &'static str {
        match &self.kind {
            TypeKind::Boolean => "BOOLEAN",
            TypeKind::Number => "NUMBER",
            TypeKind::Integer { .. } => "INTEGER",
            TypeKind::String { .. } => "STRING",
            TypeKind::Field => "FIELD",
            TypeKind::Identifier => "IDENTIFIER",
            TypeKind::Url => "URL",
            TypeKind::Text => "TEXT",
            TypeKind::Code { .. } => "CODE",
            TypeKind::Date => "DATE",
            TypeKind::DateTime => "DATETIME",
            TypeKind::Binary => "BINARY",
            TypeKind::Ref { .. } => "REF",
            TypeKind::Enum { .. } => "ENUM",
            TypeKind::Array(_) => "ARRAY",
            TypeKind::Set(_) => "SET",
            TypeKind::Object => "OBJECT",
            TypeKind::Map(_) => "MAP",
            TypeKind::Record { .. } => "RECORD",
            TypeKind::Variant(_) => "VARIANT",
            TypeKind::Type => "TYPE",
        }
    }

    /// Canonicalize `value`, failing with [`SchemaError`] if it does not
    /// conform to this type's family. Idempotent: validating a value
    /// already returned by `validate` returns an equal value.
    pub fn validate(&self, field: &str, value: &Value) -> SchemaResult<Value> {
        if matches!(value, Value::Null) {
            if self.options.not_null {
                return Err(SchemaError::ConstraintViolated {
                    field: field.to_string(),
                    detail: "null is not permitted".into(),
                });
            }
            return Ok(Value::Null);
        }

        let canonical = self.validate_shape(field, value)?;

        if self.options.not_blank && self.options.is_blank(&canonical) {
            return Err(SchemaError::ConstraintViolated {
                field: field.to_string(),
                detail: "blank value is not permitted".into(),
            });
        }

        Ok(canonical)
    }

    fn wrong_type(&self, field: &str, value: &Value) -> SchemaError {
        SchemaError::WrongType {
            field: field.to_string(),
            expected: self.kind_name().to_string(),
            actual: format!("{:?}", value),
        }
    }

    fn validate_shape(&self, field: &str, value: &Value) -> SchemaResult<Value> {
        match &self.kind {
            TypeKind::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                _ => Err(self.wrong_type(field, value)),
            },
            TypeKind::Number => match value.as_f64() {
                Some(f) => Ok(Value::Float(f)),
                None => Err(self.wrong_type(field, value)),
            },
            TypeKind::Integer { signed, width } => self.validate_integer(field, value, *signed, *width),
            TypeKind::String { min_len, max_len } => {
                self.validate_string(field, value, *min_len, *max_len, |_| true)
            }
            TypeKind::Field | TypeKind::Identifier => {
                self.validate_string(field, value, None, None, |c| c.is_alphanumeric() || c == '_')
            }
            TypeKind::Url => self.validate_string(field, value, None, None, |_| true).and_then(|v| {
                let s = v.as_str().unwrap_or_default();
                if s.contains("://") || s.starts_with('/') {
                    Ok(v)
                } else {
                    Err(SchemaError::ConstraintViolated {
                        field: field.to_string(),
                        detail: format!("not a URL: {s}"),
                    })
                }
            }),
            TypeKind::Text | TypeKind::Code { .. } | TypeKind::Date | TypeKind::DateTime => {
                self.validate_string(field, value, None, None, |_| true)
            }
            TypeKind::Binary => match value {
                Value::Bytes(_) => Ok(value.clone()),
                _ => Err(self.wrong_type(field, value)),
            },
            TypeKind::Ref { .. } => match value {
                Value::Ref(_) => Ok(value.clone()),
                _ => Err(self.wrong_type(field, value)),
            },
            TypeKind::Enum { variants } => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(value.clone()),
                _ => Err(SchemaError::ConstraintViolated {
                    field: field.to_string(),
                    detail: format!("not one of {variants:?}"),
                }),
            },
            TypeKind::Array(item) | TypeKind::Set(item) => match value {
                Value::List(items) => {
                    let validated = items
                        .iter()
                        .map(|v| item.validate(field, v))
                        .collect::<SchemaResult<Vec<_>>>()?;
                    Ok(Value::List(validated))
                }
                _ => Err(self.wrong_type(field, value)),
            },
            TypeKind::Object => match value {
                Value::Catalog(_) => Ok(value.clone()),
                _ => Err(self.wrong_type(field, value)),
            },
            TypeKind::Map(item) => match value.as_catalog() {
                Some(catalog) => {
                    let mut out = schemat_catalog::Catalog::new();
                    for (k, v) in catalog.iter() {
                        out.push(k.clone(), item.validate(field, v)?);
                    }
                    Ok(Value::Catalog(out))
                }
                None => Err(self.wrong_type(field, value)),
            },
            TypeKind::Record { fields, strict } => self.validate_record(field, value, fields, *strict),
            TypeKind::Variant(variants) => {
                for (_, candidate) in variants {
                    if candidate.validate_shape(field, value).is_ok() {
                        return candidate.validate(field, value);
                    }
                }
                Err(SchemaError::ConstraintViolated {
                    field: field.to_string(),
                    detail: "value matches no variant".into(),
                })
            }
            TypeKind::Type => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err(self.wrong_type(field, value)),
            },
        }
    }

    fn validate_integer(
        &self,
        field: &str,
        value: &Value,
        signed: bool,
        _width: IntWidth,
    ) -> SchemaResult<Value> {
        let i = match value {
            Value::Int(i) => *i,
            _ => return Err(self.wrong_type(field, value)),
        };
        if !signed && i < 0 {
            return Err(SchemaError::ConstraintViolated {
                field: field.to_string(),
                detail: "negative value for an unsigned INTEGER field".into(),
            });
        }
        Ok(Value::Int(i))
    }

    fn validate_string(
        &self,
        field: &str,
        value: &Value,
        min_len: Option<usize>,
        max_len: Option<usize>,
        charset: impl Fn(char) -> bool,
    ) -> SchemaResult<Value> {
        let s = match value {
            Value::String(s) => s,
            _ => return Err(self.wrong_type(field, value)),
        };
        if let Some(min) = min_len {
            if s.chars().count() < min {
                return Err(SchemaError::ConstraintViolated {
                    field: field.to_string(),
                    detail: format!("shorter than minimum length {min}"),
                });
            }
        }
        if let Some(max) = max_len {
            if s.chars().count() > max {
                return Err(SchemaError::ConstraintViolated {
                    field: field.to_string(),
                    detail: format!("longer than maximum length {max}"),
                });
            }
        }
        if !s.chars().all(&charset) {
            return Err(SchemaError::ConstraintViolated {
                field: field.to_string(),
                detail: "contains characters outside the allowed charset".into(),
            });
        }
        Ok(Value::String(s.clone()))
    }

    fn validate_record(
        &self,
        field: &str,
        value: &Value,
        fields: &[(String, Type)],
        strict: bool,
    ) -> SchemaResult<Value> {
        let catalog = value.as_catalog().ok_or_else(|| self.wrong_type(field, value))?;
        let mut out = schemat_catalog::Catalog::new();
        for (key, value) in catalog.iter() {
            let Some(key) = key else {
                out.push(None, value.clone());
                continue;
            };
            match fields.iter().find(|(name, _)| name == key) {
                Some((_, field_type)) => out.push(Some(key.clone()), field_type.validate(key, value)?),
                None if strict => {
                    return Err(SchemaError::ConstraintViolated {
                        field: field.to_string(),
                        detail: format!("unexpected field in strict record: {key}"),
                    })
                }
                None => out.push(Some(key.clone()), value.clone()),
            }
        }
        for (name, field_type) in fields {
            if field_type.options.required && catalog.get(name).ok().flatten().is_none() {
                return Err(SchemaError::MissingRequired(name.clone()));
            }
        }
        Ok(Value::Catalog(out))
    }

    /// Merge per-ancestor value arrays into the final resolved list for
    /// this field. `arrays[0]` is the object's own values; the rest are
    /// the field's resolved values from each ancestor in priority order
    /// (closest prototype first, category defaults last).
    pub fn combine_inherited(
        &self,
        _field: &str,
        arrays: &[Vec<Value>],
        host: &dyn ImputeHost,
    ) -> SchemaResult<Vec<Value>> {
        let own_only = !self.options.inherited;
        let effective: Vec<&Vec<Value>> = if own_only {
            arrays.iter().take(1).collect()
        } else {
            arrays.iter().collect()
        };
        let flattened: Vec<Value> = effective.into_iter().flat_map(|a| a.iter().cloned()).collect();

        if self.options.multiple {
            return Ok(flattened);
        }

        if flattened.is_empty() {
            return match self.impute(host) {
                Some(v) => Ok(vec![v]),
                None => Ok(vec![]),
            };
        }

        if flattened.len() > 1 && self.options.mergeable {
            Ok(vec![self.merge_inherited(&flattened)?])
        } else {
            // Not mergeable, or only one candidate: pick the youngest,
            // i.e. the most specific entry (`arrays[0]`, the object's
            // own value, sorts first into `flattened`).
            Ok(vec![flattened.into_iter().next().unwrap()])
        }
    }

    /// Type-family-specific merge of several candidate values into one,
    /// used when `multiple=false` and `mergeable=true`.
    pub fn merge_inherited(&self, values: &[Value]) -> SchemaResult<Value> {
        match &self.kind {
            TypeKind::Object | TypeKind::Record { .. } | TypeKind::Map(_) => {
                let mut merged = schemat_catalog::Catalog::new();
                let mut seen = std::collections::HashSet::new();
                for value in values {
                    let Some(catalog) = value.as_catalog() else {
                        continue;
                    };
                    for (key, entry) in catalog.iter() {
                        if let Some(key) = key {
                            if seen.insert(key.clone()) {
                                merged.push(Some(key.clone()), entry.clone());
                            }
                        } else {
                            merged.push(None, entry.clone());
                        }
                    }
                }
                Ok(Value::Catalog(merged))
            }
            TypeKind::Set(_) => {
                let mut out = Vec::new();
                for value in values {
                    if let Value::List(items) = value {
                        for item in items {
                            if !out.contains(item) {
                                out.push(item.clone());
                            }
                        }
                    }
                }
                Ok(Value::List(out))
            }
            _ => Ok(values.first().cloned().unwrap_or(Value::Null)),
        }
    }

    /// Compute the imputed value for this field when no own or
    /// inherited candidate exists.
    pub fn impute(&self, host: &dyn ImputeHost) -> Option<Value> {
        match &self.options.impute {
            Some(Impute::Default(v)) => Some(v.clone()),
            Some(Impute::Method(name)) => host.invoke_impute(name),
            None => None,
        }
    }

    /// Whether this type's binary encoding is usable as an index key.
    pub fn is_indexable(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Integer { .. } | TypeKind::Ref { .. } | TypeKind::String { .. } | TypeKind::Field
        )
    }

    /// Encode `value` using the order-preserving binary codec, for types
    /// that support index keys (spec §4.A/§4.B).
    pub fn write_binary(&self, value: &Value) -> SchemaResult<Vec<u8>> {
        match &self.kind {
            TypeKind::Integer { signed, width } => {
                let i = value.as_f64().map(|f| f as i64);
                match width {
                    IntWidth::Adaptive if *signed => Ok(schemat_types::encode_i64_adaptive(i)),
                    IntWidth::Adaptive => {
                        Ok(schemat_types::encode_u64_adaptive(i.map(|v| v as u64)))
                    }
                    IntWidth::Fixed(w) => Ok(schemat_types::encode_i64_fixed(i, *w)?),
                }
            }
            TypeKind::Ref { .. } => {
                let id = match value {
                    Value::Ref(ObjectId(id)) => Some(*id),
                    _ => None,
                };
                Ok(schemat_types::encode_i64_adaptive(id))
            }
            TypeKind::String { .. } | TypeKind::Field => match value.as_str() {
                Some(s) => Ok(s.as_bytes().to_vec()),
                None => Err(SchemaError::NotIndexable(self.kind_name().to_string())),
            },
            _ => Err(SchemaError::NotIndexable(self.kind_name().to_string())),
        }
    }

    /// Decode bytes produced by [`Type::write_binary`] back into a
    /// [`Value`].
    pub fn read_binary(&self, bytes: &[u8]) -> SchemaResult<Value> {
        match &self.kind {
            TypeKind::Integer { signed, width } => {
                let decoded = match width {
                    IntWidth::Adaptive if *signed => schemat_types::decode_i64_adaptive(bytes)?,
                    IntWidth::Adaptive => {
                        schemat_types::decode_u64_adaptive(bytes)?.map(|v| v as i64)
                    }
                    IntWidth::Fixed(_) => schemat_types::decode_i64_fixed(bytes)?,
                };
                Ok(decoded.map(Value::Int).unwrap_or(Value::Null))
            }
            TypeKind::Ref { .. } => {
                let decoded = schemat_types::decode_i64_adaptive(bytes)?;
                Ok(decoded.map(|id| Value::Ref(ObjectId(id))).unwrap_or(Value::Null))
            }
            TypeKind::String { .. } | TypeKind::Field => {
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| SchemaError::NotIndexable(self.kind_name().to_string()))?;
                Ok(Value::String(s))
            }
            _ => Err(SchemaError::NotIndexable(self.kind_name().to_string())),
        }
    }

    /// Order two binary-encoded keys the same way their decoded values
    /// would order (delegates to [`compare_bin`]).
    pub fn compare_keys(a: Option<&[u8]>, b: Option<&[u8]>) -> std::cmp::Ordering {
        compare_bin(a, b)
    }
}

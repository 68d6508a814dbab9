//! Tree-shaped encode/decode between [`JsonxValue`] and plain JSON
//! (spec §4.C). Cyclic-graph rejection lives in [`crate::registry`],
//! since an owned [`JsonxValue`] tree cannot itself contain a cycle —
//! only a graph of shared class instances can.

use serde_json::{json, Map, Number};
use thiserror::Error;

use schemat_types::ObjectId;

use crate::value::JsonxValue;

const TAG: &str = "@";
const PAYLOAD: &str = "=";
const TAG_BIN: &str = "bin";
const TAG_BIGINT: &str = "bigint";
const TAG_CLASS: &str = "class";
const TAG_WRAP: &str = "wrap";

/// Errors produced while encoding or decoding a JSONx tree.
#[derive(Debug, Error, PartialEq)]
pub enum JsonxError {
    /// A tagged object did not match any recognized shape.
    #[error("unrecognized JSONx tag shape: {0}")]
    UnrecognizedTag(String),
    /// A numeric value could not be represented.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    /// Hex decoding of a byte buffer failed.
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
}

type Result<T> = std::result::Result<T, JsonxError>;

/// Encode a [`JsonxValue`] tree into plain `serde_json::Value`.
pub fn encode(value: &JsonxValue) -> serde_json::Value {
    match value {
        JsonxValue::Null => serde_json::Value::Null,
        JsonxValue::Bool(b) => json!(b),
        JsonxValue::Int(i) => json!(i),
        JsonxValue::Float(f) => json!(f),
        JsonxValue::String(s) => json!(s),
        JsonxValue::Array(items) => serde_json::Value::Array(items.iter().map(encode).collect()),
        JsonxValue::Object(fields) => encode_object(fields),
        JsonxValue::Bytes(bytes) => json!({ PAYLOAD: hex::encode(bytes), TAG: TAG_BIN }),
        JsonxValue::BigInt(digits) => json!({ PAYLOAD: digits, TAG: TAG_BIGINT }),
        JsonxValue::ClassRef(path) => json!({ PAYLOAD: path, TAG: TAG_CLASS }),
        JsonxValue::Ref(id) => json!({ TAG: id.0 }),
        JsonxValue::Instance { classpath, fields } => {
            let mut map = Map::with_capacity(fields.len() + 1);
            for (k, v) in fields {
                map.insert(k.clone(), encode(v));
            }
            map.insert(TAG.to_string(), json!(classpath));
            serde_json::Value::Object(map)
        }
    }
}

fn encode_object(fields: &[(String, JsonxValue)]) -> serde_json::Value {
    let mut map = Map::with_capacity(fields.len());
    for (k, v) in fields {
        map.insert(k.clone(), encode(v));
    }
    if map.contains_key(TAG) {
        // A plain object that happens to use the reserved key collides
        // with every tagged shape below; wrap it so decode can tell the
        // two apart.
        json!({ PAYLOAD: serde_json::Value::Object(map), TAG: TAG_WRAP })
    } else {
        serde_json::Value::Object(map)
    }
}

/// Decode plain JSON into a [`JsonxValue`] tree. The inverse of
/// [`encode`].
pub fn decode(json: &serde_json::Value) -> Result<JsonxValue> {
    match json {
        serde_json::Value::Null => Ok(JsonxValue::Null),
        serde_json::Value::Bool(b) => Ok(JsonxValue::Bool(*b)),
        serde_json::Value::Number(n) => decode_number(n),
        serde_json::Value::String(s) => Ok(JsonxValue::String(s.clone())),
        serde_json::Value::Array(items) => {
            Ok(JsonxValue::Array(items.iter().map(decode).collect::<Result<_>>()?))
        }
        serde_json::Value::Object(map) => decode_object(map),
    }
}

fn decode_number(n: &Number) -> Result<JsonxValue> {
    if let Some(i) = n.as_i64() {
        Ok(JsonxValue::Int(i))
    } else if let Some(f) = n.as_f64() {
        Ok(JsonxValue::Float(f))
    } else {
        Err(JsonxError::InvalidNumber(n.to_string()))
    }
}

fn decode_object(map: &Map<String, serde_json::Value>) -> Result<JsonxValue> {
    let Some(tag) = map.get(TAG) else {
        // No reserved key: a plain object, decoded field by field.
        let fields = map
            .iter()
            .map(|(k, v)| Ok((k.clone(), decode(v)?)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(JsonxValue::Object(fields));
    };

    if let Some(id) = tag.as_i64() {
        return Ok(JsonxValue::Ref(ObjectId(id)));
    }

    let tag_str = tag
        .as_str()
        .ok_or_else(|| JsonxError::UnrecognizedTag(tag.to_string()))?;

    match tag_str {
        TAG_WRAP => {
            let inner = map
                .get(PAYLOAD)
                .and_then(|v| v.as_object())
                .ok_or_else(|| JsonxError::UnrecognizedTag("wrap without payload object".into()))?;
            let fields = inner
                .iter()
                .map(|(k, v)| Ok((k.clone(), decode(v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(JsonxValue::Object(fields))
        }
        TAG_BIN => {
            let hex_str = map
                .get(PAYLOAD)
                .and_then(|v| v.as_str())
                .ok_or_else(|| JsonxError::UnrecognizedTag("bin without payload".into()))?;
            let bytes = hex::decode(hex_str).map_err(|e| JsonxError::InvalidHex(e.to_string()))?;
            Ok(JsonxValue::Bytes(bytes))
        }
        TAG_BIGINT => {
            let digits = map
                .get(PAYLOAD)
                .and_then(|v| v.as_str())
                .ok_or_else(|| JsonxError::UnrecognizedTag("bigint without payload".into()))?;
            Ok(JsonxValue::BigInt(digits.to_string()))
        }
        TAG_CLASS => {
            let path = map
                .get(PAYLOAD)
                .and_then(|v| v.as_str())
                .ok_or_else(|| JsonxError::UnrecognizedTag("class without payload".into()))?;
            Ok(JsonxValue::ClassRef(path.to_string()))
        }
        classpath => {
            let fields = map
                .iter()
                .filter(|(k, _)| k.as_str() != TAG)
                .map(|(k, v)| Ok((k.clone(), decode(v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(JsonxValue::Instance { classpath: classpath.to_string(), fields })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_pass_through() {
        let value = JsonxValue::Array(vec![
            JsonxValue::Null,
            JsonxValue::Bool(true),
            JsonxValue::Int(42),
            JsonxValue::Float(1.5),
            JsonxValue::String("hi".into()),
        ]);
        let json = encode(&value);
        assert_eq!(json, serde_json::json!([null, true, 42, 1.5, "hi"]));
        assert_eq!(decode(&json).unwrap(), value);
    }

    #[test]
    fn web_object_ref_round_trips() {
        let value = JsonxValue::Ref(ObjectId(17));
        let json = encode(&value);
        assert_eq!(json, serde_json::json!({"@": 17}));
        assert_eq!(decode(&json).unwrap(), value);

        let provisional = JsonxValue::Ref(ObjectId(-3));
        let json = encode(&provisional);
        assert_eq!(json, serde_json::json!({"@": -3}));
        assert_eq!(decode(&json).unwrap(), provisional);
    }

    #[test]
    fn byte_buffer_round_trips() {
        let value = JsonxValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let json = encode(&value);
        assert_eq!(json, serde_json::json!({"=": "deadbeef", "@": "bin"}));
        assert_eq!(decode(&json).unwrap(), value);
    }

    #[test]
    fn bigint_and_classref_round_trip() {
        let big = JsonxValue::BigInt("123456789012345678901234567890".into());
        assert_eq!(decode(&encode(&big)).unwrap(), big);

        let class = JsonxValue::ClassRef("schemat.core.Node".into());
        assert_eq!(decode(&encode(&class)).unwrap(), class);
    }

    #[test]
    fn plain_object_colliding_with_tag_key_is_wrapped() {
        let value = JsonxValue::Object(vec![("@".into(), JsonxValue::Int(1))]);
        let json = encode(&value);
        assert_eq!(json, serde_json::json!({"=": {"@": 1}, "@": "wrap"}));
        assert_eq!(decode(&json).unwrap(), value);
    }

    #[test]
    fn plain_object_without_collision_is_untagged() {
        let value = JsonxValue::object([("name", JsonxValue::from("node-1"))]);
        let json = encode(&value);
        assert_eq!(json, serde_json::json!({"name": "node-1"}));
        assert_eq!(decode(&json).unwrap(), value);
    }

    #[test]
    fn custom_class_instance_round_trips() {
        let value = JsonxValue::Instance {
            classpath: "schemat.core.Category".into(),
            fields: vec![("name".into(), JsonxValue::from("Node")), ("version".into(), JsonxValue::Int(3))],
        };
        let json = encode(&value);
        assert_eq!(json, serde_json::json!({"name": "Node", "version": 3, "@": "schemat.core.Category"}));
        assert_eq!(decode(&json).unwrap(), value);
    }
}

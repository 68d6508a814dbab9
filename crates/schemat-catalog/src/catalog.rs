//! The `Catalog` ordered collection and its structural edit operators.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use schemat_types::ObjectId;

use crate::value::Value;

/// Errors produced while navigating or editing a [`Catalog`].
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// A dotted path segment did not resolve to an existing nested catalog.
    #[error("path segment not found or not a catalog: {0}")]
    PathNotFound(String),
    /// An edit targeted a key that does not exist.
    #[error("key not found: {0}")]
    KeyNotFound(String),
    /// An edit expected a numeric value but found something else.
    #[error("value at {0} is not numeric")]
    NotNumeric(String),
    /// The JSON payload could not be decoded into a [`Value`] tree.
    #[error("malformed catalog JSON: {0}")]
    Malformed(String),
}

type Result<T> = std::result::Result<T, CatalogError>;

/// An ordered sequence of `(key, value)` entries where the same key may
/// repeat (spec §4.D). Iteration order is always insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    entries: Vec<(Option<String>, Value)>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog directly from a vector of entries, preserving order
    /// and duplicates.
    pub fn from_entries(entries: Vec<(Option<String>, Value)>) -> Self {
        Self { entries }
    }

    /// Number of entries, including duplicate keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Option<String>, Value)> {
        self.entries.iter()
    }

    /// Append a raw entry at the end, without going through the edit log.
    /// Used by deserializers and by `Edit::Insert` when no position is given.
    pub fn push(&mut self, key: Option<String>, value: Value) {
        self.entries.push((key, value));
    }

    //───────────────────── navigation ─────────────────────

    /// Split `path` into `(parent_segments, leaf_key)`. An empty path has
    /// an empty leaf key, meaning "the catalog itself" for operators that
    /// address a whole catalog rather than a single entry.
    fn split_path(path: &str) -> (Vec<&str>, &str) {
        if path.is_empty() {
            return (Vec::new(), "");
        }
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop().unwrap_or("");
        (segments, leaf)
    }

    fn navigate<'a>(&'a self, segments: &[&str]) -> Result<&'a Catalog> {
        let mut current = self;
        for seg in segments {
            let found = current
                .entries
                .iter()
                .find(|(k, _)| k.as_deref() == Some(*seg))
                .and_then(|(_, v)| v.as_catalog())
                .ok_or_else(|| CatalogError::PathNotFound((*seg).to_string()))?;
            current = found;
        }
        Ok(current)
    }

    fn navigate_mut<'a>(&'a mut self, segments: &[&str]) -> Result<&'a mut Catalog> {
        let mut current = self;
        for seg in segments {
            let found = current
                .entries
                .iter_mut()
                .find(|(k, _)| k.as_deref() == Some(*seg))
                .and_then(|(_, v)| v.as_catalog_mut())
                .ok_or_else(|| CatalogError::PathNotFound((*seg).to_string()))?;
            current = found;
        }
        Ok(current)
    }

    //───────────────────── read access ─────────────────────

    /// Return the first value stored under `path`, navigating nested
    /// catalogs for every segment but the last.
    pub fn get(&self, path: &str) -> Result<Option<&Value>> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate(&parents)?;
        Ok(parent
            .entries
            .iter()
            .find(|(k, _)| k.as_deref() == Some(leaf))
            .map(|(_, v)| v))
    }

    /// Return every value stored under `path`, in insertion order.
    pub fn get_all(&self, path: &str) -> Result<Vec<&Value>> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate(&parents)?;
        Ok(parent
            .entries
            .iter()
            .filter(|(k, _)| k.as_deref() == Some(leaf))
            .map(|(_, v)| v)
            .collect())
    }

    //───────────────────── edit application ─────────────────────

    /// Apply a single structural edit in place.
    pub fn apply(&mut self, edit: &Edit) -> Result<()> {
        match edit {
            Edit::Set { path, value } => self.do_set(path, value.clone()),
            Edit::SetKey { path, new_key } => self.do_set_key(path, new_key),
            Edit::Insert { parent, pos, key, value } => {
                self.do_insert(parent, *pos, key.clone(), value.clone())
            }
            Edit::Delete { path } => self.do_delete(path),
            Edit::Move { path, delta } => self.do_move(path, *delta),
            Edit::Increment { path, amount } => self.do_increment(path, *amount),
            Edit::Overwrite { path, entries } => self.do_overwrite(path, entries.clone()),
            // Version guards carry no catalog-level mutation; the
            // transaction/commit layer checks them before edits are sent.
            Edit::IfVersion { .. } => Ok(()),
        }
    }

    /// Apply a sequence of edits in order, stopping at the first failure.
    pub fn apply_all(&mut self, edits: &[Edit]) -> Result<()> {
        for edit in edits {
            self.apply(edit)?;
        }
        Ok(())
    }

    fn do_set(&mut self, path: &str, value: Value) -> Result<()> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate_mut(&parents)?;
        if let Some(entry) = parent.entries.iter_mut().find(|(k, _)| k.as_deref() == Some(leaf)) {
            entry.1 = value;
        } else {
            parent.entries.push((Some(leaf.to_string()), value));
        }
        Ok(())
    }

    fn do_set_key(&mut self, path: &str, new_key: &str) -> Result<()> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate_mut(&parents)?;
        let entry = parent
            .entries
            .iter_mut()
            .find(|(k, _)| k.as_deref() == Some(leaf))
            .ok_or_else(|| CatalogError::KeyNotFound(leaf.to_string()))?;
        entry.0 = Some(new_key.to_string());
        Ok(())
    }

    fn do_insert(
        &mut self,
        parent_path: &str,
        pos: Option<usize>,
        key: Option<String>,
        value: Value,
    ) -> Result<()> {
        let (parents, leaf) = Self::split_path(parent_path);
        let parent = if leaf.is_empty() {
            self.navigate_mut(&parents)?
        } else {
            // `parent_path` named a nested catalog field directly.
            let mut full = parents;
            full.push(leaf);
            self.navigate_mut(&full)?
        };
        let index = pos.unwrap_or(parent.entries.len()).min(parent.entries.len());
        parent.entries.insert(index, (key, value));
        Ok(())
    }

    fn do_delete(&mut self, path: &str) -> Result<()> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate_mut(&parents)?;
        parent.entries.retain(|(k, _)| k.as_deref() != Some(leaf));
        Ok(())
    }

    fn do_move(&mut self, path: &str, delta: i32) -> Result<()> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate_mut(&parents)?;
        let index = parent
            .entries
            .iter()
            .position(|(k, _)| k.as_deref() == Some(leaf))
            .ok_or_else(|| CatalogError::KeyNotFound(leaf.to_string()))?;
        let new_index = (index as i64 + delta as i64)
            .clamp(0, parent.entries.len() as i64 - 1) as usize;
        let entry = parent.entries.remove(index);
        parent.entries.insert(new_index, entry);
        Ok(())
    }

    fn do_increment(&mut self, path: &str, amount: f64) -> Result<()> {
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate_mut(&parents)?;
        let entry = parent
            .entries
            .iter_mut()
            .find(|(k, _)| k.as_deref() == Some(leaf))
            .ok_or_else(|| CatalogError::KeyNotFound(leaf.to_string()))?;
        match &mut entry.1 {
            Value::Int(i) => *i += amount as i64,
            Value::Float(f) => *f += amount,
            _ => return Err(CatalogError::NotNumeric(leaf.to_string())),
        }
        Ok(())
    }

    fn do_overwrite(&mut self, path: &str, entries: Vec<(Option<String>, Value)>) -> Result<()> {
        if path.is_empty() {
            self.entries = entries;
            return Ok(());
        }
        let (parents, leaf) = Self::split_path(path);
        let parent = self.navigate_mut(&parents)?;
        if let Some(entry) = parent.entries.iter_mut().find(|(k, _)| k.as_deref() == Some(leaf)) {
            entry.1 = Value::Catalog(Catalog::from_entries(entries));
        } else {
            parent
                .entries
                .push((Some(leaf.to_string()), Value::Catalog(Catalog::from_entries(entries))));
        }
        Ok(())
    }

    //───────────────────── structural transform ─────────────────────

    /// Walk the catalog tree depth-first, replacing every value for which
    /// `replacer` returns `Some`, and recursing into nested catalogs and
    /// lists otherwise. Returns a new catalog; `self` is untouched.
    pub fn transform(&self, replacer: &mut dyn FnMut(&Value) -> Option<Value>) -> Catalog {
        let entries = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Self::transform_value(v, replacer)))
            .collect();
        Catalog { entries }
    }

    fn transform_value(value: &Value, replacer: &mut dyn FnMut(&Value) -> Option<Value>) -> Value {
        if let Some(replacement) = replacer(value) {
            return replacement;
        }
        match value {
            Value::Catalog(c) => Value::Catalog(c.transform(replacer)),
            Value::List(items) => Value::List(
                items.iter().map(|v| Self::transform_value(v, replacer)).collect(),
            ),
            other => other.clone(),
        }
    }

    //───────────────────── JSON round trip ─────────────────────

    /// Encode into a plain JSON structure: an array of `[key, value]`
    /// pairs, safe to pass to any JSON serializer (spec §4.D).
    pub fn encode(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.entries
                .iter()
                .map(|(k, v)| {
                    let key_json = match k {
                        Some(s) => serde_json::Value::String(s.clone()),
                        None => serde_json::Value::Null,
                    };
                    json!([key_json, Self::encode_value(v)])
                })
                .collect(),
        )
    }

    fn encode_value(value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::String(s) => json!(s),
            Value::Bytes(bytes) => json!({"=": hex::encode(bytes), "@": "bin"}),
            Value::Ref(id) => json!({"@": id.0}),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::encode_value).collect())
            }
            Value::Catalog(c) => c.encode(),
        }
    }

    /// Inverse of [`Catalog::encode`].
    pub fn load(json: &serde_json::Value) -> Result<Catalog> {
        let array = json
            .as_array()
            .ok_or_else(|| CatalogError::Malformed("expected top-level array".into()))?;
        let mut entries = Vec::with_capacity(array.len());
        for pair in array {
            let pair = pair
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| CatalogError::Malformed("expected [key, value] pair".into()))?;
            let key = match &pair[0] {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                _ => return Err(CatalogError::Malformed("key must be string or null".into())),
            };
            entries.push((key, Self::load_value(&pair[1])?));
        }
        Ok(Catalog { entries })
    }

    fn load_value(json: &serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else {
                    Ok(Value::Float(n.as_f64().unwrap_or_default()))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                // An array of exactly 2-element [key, value] pairs where
                // every key is itself string-or-null denotes a nested
                // catalog; anything else is a plain list.
                if !items.is_empty()
                    && items.iter().all(|i| {
                        i.as_array().is_some_and(|p| {
                            p.len() == 2 && matches!(p[0], serde_json::Value::String(_) | serde_json::Value::Null)
                        })
                    })
                {
                    Ok(Value::Catalog(Self::load(json)?))
                } else {
                    Ok(Value::List(
                        items.iter().map(Self::load_value).collect::<Result<_>>()?,
                    ))
                }
            }
            serde_json::Value::Object(map) => {
                if let Some(hex_str) = map.get("=").and_then(|v| v.as_str()) {
                    if map.get("@").and_then(|v| v.as_str()) == Some("bin") {
                        let bytes = hex::decode(hex_str)
                            .map_err(|e| CatalogError::Malformed(e.to_string()))?;
                        return Ok(Value::Bytes(bytes));
                    }
                }
                if let Some(id) = map.get("@").and_then(|v| v.as_i64()) {
                    return Ok(Value::Ref(ObjectId(id)));
                }
                Err(CatalogError::Malformed("unrecognized object shape".into()))
            }
        }
    }
}

/// A single structural mutation, applied immediately to a mutable twin's
/// catalog and appended to its edit log (spec §4.D, §4.G).
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace (or create) the value at `path`.
    Set {
        /// Dotted path of the field to set.
        path: String,
        /// New value.
        value: Value,
    },
    /// Rename the key found at `path`.
    SetKey {
        /// Dotted path of the entry to rekey.
        path: String,
        /// The new key.
        new_key: String,
    },
    /// Insert a new `(key, value)` entry into the catalog found at
    /// `parent` (empty string denotes the root catalog).
    Insert {
        /// Dotted path to the parent catalog.
        parent: String,
        /// Insertion index; `None` appends at the end.
        pos: Option<usize>,
        /// Key of the new entry, if any.
        key: Option<String>,
        /// Value of the new entry.
        value: Value,
    },
    /// Remove every entry found at `path`.
    Delete {
        /// Dotted path of the entry/entries to delete.
        path: String,
    },
    /// Move the entry at `path` by `delta` positions within its parent.
    Move {
        /// Dotted path of the entry to move.
        path: String,
        /// Signed offset; negative moves up (earlier), positive moves down.
        delta: i32,
    },
    /// Add `amount` to the numeric value found at `path`.
    Increment {
        /// Dotted path of the numeric entry.
        path: String,
        /// Amount to add (may be negative).
        amount: f64,
    },
    /// Bulk-replace the entries of the catalog found at `path` (empty
    /// string denotes the root catalog).
    Overwrite {
        /// Dotted path of the catalog to overwrite.
        path: String,
        /// Replacement entries.
        entries: Vec<(Option<String>, Value)>,
    },
    /// Optimistic concurrency guard: the commit must fail unless the
    /// object's stored version equals `expected`.
    IfVersion {
        /// Version the caller last observed.
        expected: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::from_entries(vec![
            (Some("a".into()), Value::Int(1)),
            (Some("b".into()), Value::Int(2)),
        ])
    }

    #[test]
    fn edit_replay_matches_spec_scenario() {
        let mut catalog = sample();
        let edits = vec![
            Edit::Set { path: "b".into(), value: Value::Int(3) },
            Edit::Insert { parent: "".into(), pos: None, key: Some("c".into()), value: Value::Int(4) },
            Edit::Delete { path: "a".into() },
        ];
        catalog.apply_all(&edits).unwrap();

        let expected = Catalog::from_entries(vec![
            (Some("b".into()), Value::Int(3)),
            (Some("c".into()), Value::Int(4)),
        ]);
        assert_eq!(catalog, expected);

        // Replaying the same edits against a fresh copy of the pre-image
        // reproduces the exact same post-image.
        let mut replay = sample();
        replay.apply_all(&edits).unwrap();
        assert_eq!(replay, catalog);
    }

    #[test]
    fn encode_then_load_round_trips() {
        let catalog = sample();
        let json = catalog.encode();
        let reloaded = Catalog::load(&json).unwrap();
        assert_eq!(catalog, reloaded);
    }

    #[test]
    fn duplicate_keys_are_preserved() {
        let mut catalog = Catalog::new();
        catalog.push(Some("tag".into()), Value::String("x".into()));
        catalog.push(Some("tag".into()), Value::String("y".into()));
        let all = catalog.get_all("tag").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].as_str(), Some("x"));
        assert_eq!(all[1].as_str(), Some("y"));
    }

    #[test]
    fn move_reorders_within_parent() {
        let mut catalog = Catalog::from_entries(vec![
            (Some("a".into()), Value::Int(1)),
            (Some("b".into()), Value::Int(2)),
            (Some("c".into()), Value::Int(3)),
        ]);
        catalog.apply(&Edit::Move { path: "a".into(), delta: 2 }).unwrap();
        let keys: Vec<_> = catalog.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Some("b".into()), Some("c".into()), Some("a".into())]);
    }

    #[test]
    fn increment_requires_numeric_value() {
        let mut catalog = Catalog::from_entries(vec![(Some("x".into()), Value::String("nope".into()))]);
        let err = catalog.apply(&Edit::Increment { path: "x".into(), amount: 1.0 }).unwrap_err();
        assert_eq!(err, CatalogError::NotNumeric("x".into()));
    }

    #[test]
    fn nested_path_navigation() {
        let inner = Catalog::from_entries(vec![(Some("z".into()), Value::Int(9))]);
        let outer = Catalog::from_entries(vec![(Some("nested".into()), Value::Catalog(inner))]);
        assert_eq!(outer.get("nested.z").unwrap(), Some(&Value::Int(9)));
    }
}

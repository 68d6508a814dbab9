//! The process-wide class registry and cyclic-graph-aware encoder
//! (spec §4.C).
//!
//! A plain [`crate::JsonxValue`] tree is owned data and cannot contain a
//! cycle by construction. Cycles only arise when custom-class instances
//! are linked by shared pointers (`Arc`), so that is the shape
//! [`encode_graph`] guards against; [`crate::codec`] handles the
//! ordinary tree case.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::codec::encode;
use crate::value::JsonxValue;

/// Implemented by any custom class instance that participates in JSONx
/// encoding as a node that may be shared (and therefore must be checked
/// for cycles) rather than owned outright.
pub trait Encodable: Send + Sync {
    /// Dotted classpath this instance encodes under.
    fn classpath(&self) -> String;
    /// Field values, each either a plain [`JsonxValue`] leaf or another
    /// shared node.
    fn jsonx_fields(&self) -> Vec<(String, GraphField)>;
}

/// One field of an [`Encodable`] node.
pub enum GraphField {
    /// A leaf value with no further graph structure.
    Leaf(JsonxValue),
    /// A child node, potentially shared with other parents.
    Child(Arc<dyn Encodable>),
}

/// Errors raised while encoding a graph of [`Encodable`] nodes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The graph being encoded contains a cycle through shared nodes.
    #[error("cyclic object graph detected at classpath {0}")]
    Cyclic(String),
    /// A classpath was encoded for a class never registered.
    #[error("classpath not registered: {0}")]
    UnknownClass(String),
}

/// Maps dotted classpaths to their registration, so decode can validate
/// that a tagged instance names a class the process actually knows
/// about. Must be populated before any decode runs (spec §4.C).
#[derive(Debug, Default)]
pub struct ClassRegistry {
    known: RwLock<HashMap<String, ()>>,
}

impl ClassRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a classpath as decodable.
    pub fn register(&self, classpath: impl Into<String>) {
        self.known.write().expect("class registry lock poisoned").insert(classpath.into(), ());
    }

    /// Whether `classpath` has been registered.
    pub fn contains(&self, classpath: &str) -> bool {
        self.known.read().expect("class registry lock poisoned").contains_key(classpath)
    }
}

/// Encode a possibly-shared graph rooted at `root`, rejecting cycles.
/// Nodes reachable via two different paths (a DAG, not a cycle) encode
/// successfully, each occurrence inlined independently.
pub fn encode_graph(
    root: &Arc<dyn Encodable>,
    registry: &ClassRegistry,
) -> Result<serde_json::Value, GraphError> {
    let mut in_progress = HashSet::new();
    encode_node(root, registry, &mut in_progress)
}

fn node_identity(node: &Arc<dyn Encodable>) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

fn encode_node(
    node: &Arc<dyn Encodable>,
    registry: &ClassRegistry,
    in_progress: &mut HashSet<usize>,
) -> Result<serde_json::Value, GraphError> {
    let classpath = node.classpath();
    if !registry.contains(&classpath) {
        return Err(GraphError::UnknownClass(classpath));
    }

    let id = node_identity(node);
    if !in_progress.insert(id) {
        return Err(GraphError::Cyclic(classpath));
    }

    let mut fields = Vec::new();
    for (key, field) in node.jsonx_fields() {
        let value = match field {
            GraphField::Leaf(value) => encode(&value),
            GraphField::Child(child) => encode_node(&child, registry, in_progress)?,
        };
        fields.push((key, value));
    }

    in_progress.remove(&id);

    let mut map = serde_json::Map::with_capacity(fields.len() + 1);
    for (k, v) in fields {
        map.insert(k, v);
    }
    map.insert("@".to_string(), serde_json::Value::String(classpath));
    Ok(serde_json::Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Node {
        name: String,
        next: Mutex<Option<Arc<dyn Encodable>>>,
    }

    impl Encodable for Node {
        fn classpath(&self) -> String {
            "test.Node".into()
        }

        fn jsonx_fields(&self) -> Vec<(String, GraphField)> {
            let mut fields = vec![("name".to_string(), GraphField::Leaf(JsonxValue::from(self.name.as_str())))];
            if let Some(next) = self.next.lock().unwrap().clone() {
                fields.push(("next".to_string(), GraphField::Child(next)));
            }
            fields
        }
    }

    #[test]
    fn acyclic_chain_encodes() {
        let registry = ClassRegistry::new();
        registry.register("test.Node");

        let tail: Arc<dyn Encodable> = Arc::new(Node { name: "tail".into(), next: Mutex::new(None) });
        let head: Arc<dyn Encodable> =
            Arc::new(Node { name: "head".into(), next: Mutex::new(Some(tail)) });

        let json = encode_graph(&head, &registry).unwrap();
        assert_eq!(json["name"], "head");
        assert_eq!(json["next"]["name"], "tail");
    }

    #[test]
    fn self_cycle_is_rejected() {
        let registry = ClassRegistry::new();
        registry.register("test.Node");

        let node = Arc::new(Node { name: "a".into(), next: Mutex::new(None) });
        let node_dyn: Arc<dyn Encodable> = node.clone();
        *node.next.lock().unwrap() = Some(node_dyn.clone());

        let err = encode_graph(&node_dyn, &registry).unwrap_err();
        assert_eq!(err, GraphError::Cyclic("test.Node".into()));
    }

    #[test]
    fn unregistered_class_is_rejected() {
        let registry = ClassRegistry::new();
        let node: Arc<dyn Encodable> = Arc::new(Node { name: "a".into(), next: Mutex::new(None) });
        let err = encode_graph(&node, &registry).unwrap_err();
        assert_eq!(err, GraphError::UnknownClass("test.Node".into()));
    }

    #[test]
    fn shared_dag_node_is_not_flagged_cyclic() {
        let registry = ClassRegistry::new();
        registry.register("test.Node");

        let shared: Arc<dyn Encodable> = Arc::new(Node { name: "shared".into(), next: Mutex::new(None) });
        let left: Arc<dyn Encodable> =
            Arc::new(Node { name: "left".into(), next: Mutex::new(Some(shared.clone())) });
        let parent = Node { name: "parent".into(), next: Mutex::new(Some(left)) };
        let parent: Arc<dyn Encodable> = Arc::new(parent);

        // `shared` is reachable twice in this tiny graph (once directly
        // below `left`) but never while still on the encoding stack, so
        // this must succeed.
        assert!(encode_graph(&parent, &registry).is_ok());
    }
}

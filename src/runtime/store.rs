//! Instance stores and the process-wide store registry
//!
//! Every rendered instance owns exactly one store, a JSON object keyed by
//! field name. Stores are created when the instance is initialized and
//! mutated only by the dispatcher's write-back step.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use super::error::{StoreError, StoreResult, json_kind};
use super::path::ReferencePath;

/// Identifier of a rendered UI instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create an instance id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The data store of a single instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    fields: Map<String, Value>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON value, which must be an object
    pub fn from_value(instance: &InstanceId, value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(StoreError::NotAnObject {
                instance: instance.to_string(),
                found: json_kind(&other),
            }),
        }
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the store has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up the value at `path`.
    ///
    /// A top-level key equal to the whole path wins over walking the
    /// segments, so keys containing dots stay addressable. Missing paths
    /// yield `None`.
    pub fn lookup(&self, path: &ReferencePath) -> Option<&Value> {
        if let Some(value) = self.fields.get(path.as_str()) {
            return Some(value);
        }

        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at `path`; `None` removes the entry.
    ///
    /// Missing intermediate objects are created. List slots must already
    /// exist, and removing a list slot leaves `null` in its place.
    pub fn write(&mut self, path: &ReferencePath, value: Option<Value>) -> StoreResult<()> {
        if value.is_none() && self.lookup(path).is_none() {
            return Ok(());
        }

        if path.is_top_level() || self.fields.contains_key(path.as_str()) {
            let key = path.as_str().to_string();
            match value {
                Some(value) => {
                    self.fields.insert(key, value);
                }
                None => {
                    self.fields.remove(&key);
                }
            }
            return Ok(());
        }

        let (last, parents) = path.segments().split_last().ok_or(StoreError::EmptyPath)?;
        let (first, middle) = parents.split_first().ok_or(StoreError::EmptyPath)?;

        let mut current = self
            .fields
            .entry(first.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        for segment in middle {
            current = descend_mut(current, segment, path)?;
        }
        assign(current, last, value, path)
    }

    /// The store as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn parse_index(segment: &str, path: &ReferencePath) -> StoreResult<usize> {
    segment.parse::<usize>().map_err(|_| StoreError::InvalidIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}

fn descend_mut<'a>(
    value: &'a mut Value,
    segment: &str,
    path: &ReferencePath,
) -> StoreResult<&'a mut Value> {
    match value {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = parse_index(segment, path)?;
            let len = items.len();
            items.get_mut(index).ok_or(StoreError::IndexOutOfBounds {
                path: path.to_string(),
                index,
                len,
            })
        }
        _ => Err(StoreError::PathConflict {
            path: path.to_string(),
            segment: segment.to_string(),
        }),
    }
}

fn assign(
    target: &mut Value,
    segment: &str,
    value: Option<Value>,
    path: &ReferencePath,
) -> StoreResult<()> {
    match target {
        Value::Object(map) => {
            match value {
                Some(value) => {
                    map.insert(segment.to_string(), value);
                }
                None => {
                    map.remove(segment);
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(segment, path)?;
            let len = items.len();
            let slot = items.get_mut(index).ok_or(StoreError::IndexOutOfBounds {
                path: path.to_string(),
                index,
                len,
            })?;
            *slot = value.unwrap_or(Value::Null);
            Ok(())
        }
        _ => Err(StoreError::PathConflict {
            path: path.to_string(),
            segment: segment.to_string(),
        }),
    }
}

/// Where instance initialization reads serialized stores from.
///
/// In a page this is the text content of an element; anything that can
/// map an element id to text works.
pub trait DocumentSource {
    /// Text content of the element, or `None` if it does not exist
    fn element_text(&self, element_id: &str) -> Option<String>;
}

impl DocumentSource for HashMap<String, String> {
    fn element_text(&self, element_id: &str) -> Option<String> {
        self.get(element_id).cloned()
    }
}

/// Process-wide mapping from instance id to store
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<InstanceId, Store>>,
}

impl StoreRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the store for `id`
    pub fn register(&self, id: InstanceId, data: Value) -> StoreResult<()> {
        let store = Store::from_value(&id, data)?;
        tracing::info!(instance = %id, fields = store.len(), "Registered instance store");
        self.stores.write().insert(id, store);
        Ok(())
    }

    /// Initialize `id` from the text of `element_id` in `source`.
    ///
    /// Returns `Ok(false)` without touching the registry when the element
    /// does not exist.
    pub fn init_from_source(
        &self,
        id: InstanceId,
        source: &dyn DocumentSource,
        element_id: &str,
    ) -> StoreResult<bool> {
        let Some(text) = source.element_text(element_id) else {
            tracing::debug!(
                instance = %id,
                element = element_id,
                "Store element absent, skipping init"
            );
            return Ok(false);
        };

        let data: Value =
            serde_json::from_str(&text).map_err(|source| StoreError::InvalidSource {
                element: element_id.to_string(),
                source,
            })?;
        self.register(id, data)?;
        Ok(true)
    }

    /// Snapshot of the store for `id`, or `None` for an unknown instance
    pub fn get(&self, id: &InstanceId) -> Option<Store> {
        self.stores.read().get(id).cloned()
    }

    /// Whether `id` has a store
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.stores.read().contains_key(id)
    }

    /// Mutate the store for `id` in place. Returns `None` for an unknown
    /// instance.
    pub fn update<F, R>(&self, id: &InstanceId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Store) -> R,
    {
        let mut stores = self.stores.write();
        stores.get_mut(id).map(f)
    }

    /// All registered instance ids, sorted
    pub fn instances(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.stores.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> ReferencePath {
        ReferencePath::parse(raw).unwrap()
    }

    fn store(value: Value) -> Store {
        Store::from_value(&InstanceId::new("test"), value).unwrap()
    }

    #[test]
    fn test_lookup_nested_and_indexed() {
        let store = store(json!({"a": {"b": 5}, "list": [{"x": 1}, {"x": 2}]}));
        assert_eq!(store.lookup(&path("a.b")), Some(&json!(5)));
        assert_eq!(store.lookup(&path("list.1.x")), Some(&json!(2)));
        assert_eq!(store.lookup(&path("a.missing")), None);
        assert_eq!(store.lookup(&path("a.b.c")), None);
        assert_eq!(store.lookup(&path("list.9")), None);
    }

    #[test]
    fn test_lookup_prefers_dotted_top_level_key() {
        let store = store(json!({"a.b": "flat", "a": {"b": "nested"}}));
        assert_eq!(store.lookup(&path("a.b")), Some(&json!("flat")));
    }

    #[test]
    fn test_write_prefers_dotted_top_level_key() {
        let mut store = store(json!({"a.b": "flat", "a": {"b": "nested"}}));
        store.write(&path("a.b"), Some(json!("changed"))).unwrap();
        assert_eq!(store.to_value(), json!({"a.b": "changed", "a": {"b": "nested"}}));
        assert_eq!(store.lookup(&path("a.b")), Some(&json!("changed")));

        store.write(&path("a.b"), None).unwrap();
        assert_eq!(store.to_value(), json!({"a": {"b": "nested"}}));
        assert_eq!(store.lookup(&path("a.b")), Some(&json!("nested")));
    }

    #[test]
    fn test_write_creates_intermediate_objects() {
        let mut store = store(json!({}));
        store.write(&path("user.name"), Some(json!("B"))).unwrap();
        assert_eq!(store.to_value(), json!({"user": {"name": "B"}}));
    }

    #[test]
    fn test_write_into_list_slot() {
        let mut store = store(json!({"items": [1, 2, 3]}));
        store.write(&path("items.1"), Some(json!(20))).unwrap();
        assert_eq!(store.to_value(), json!({"items": [1, 20, 3]}));

        let err = store.write(&path("items.3"), Some(json!(4))).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfBounds { index: 3, len: 3, .. }));
    }

    #[test]
    fn test_write_through_scalar_conflicts() {
        let mut store = store(json!({"count": 1}));
        let err = store.write(&path("count.value"), Some(json!(2))).unwrap_err();
        assert!(matches!(err, StoreError::PathConflict { .. }));
    }

    #[test]
    fn test_remove_entries() {
        let mut store = store(json!({"a": {"b": 1, "c": 2}, "items": [1, 2]}));
        store.write(&path("a.b"), None).unwrap();
        store.write(&path("items.0"), None).unwrap();
        store.write(&path("nothing.here"), None).unwrap();
        assert_eq!(store.to_value(), json!({"a": {"c": 2}, "items": [null, 2]}));
    }

    #[test]
    fn test_register_rejects_non_object() {
        let registry = StoreRegistry::new();
        let err = registry.register("main".into(), json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject { found: "list", .. }));
        assert!(!registry.contains(&"main".into()));
    }

    #[test]
    fn test_init_from_absent_element_is_noop() {
        let registry = StoreRegistry::new();
        let source: HashMap<String, String> = HashMap::new();
        let created = registry
            .init_from_source("main".into(), &source, "data-main")
            .unwrap();
        assert!(!created);
        assert!(registry.get(&"main".into()).is_none());
    }

    #[test]
    fn test_init_from_source_overwrites() {
        let registry = StoreRegistry::new();
        let mut source = HashMap::new();
        source.insert("data-main".to_string(), r#"{"name": "A"}"#.to_string());

        registry.register("main".into(), json!({"old": true})).unwrap();
        assert!(registry.init_from_source("main".into(), &source, "data-main").unwrap());
        assert_eq!(
            registry.get(&"main".into()).unwrap().to_value(),
            json!({"name": "A"})
        );
    }

    #[test]
    fn test_init_from_invalid_text_fails() {
        let registry = StoreRegistry::new();
        let mut source = HashMap::new();
        source.insert("data-main".to_string(), "{not json".to_string());
        let err = registry
            .init_from_source("main".into(), &source, "data-main")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidSource { .. }));
    }

    #[test]
    fn test_update_unknown_instance() {
        let registry = StoreRegistry::new();
        assert!(registry.update(&"ghost".into(), |store| store.len()).is_none());
    }
}

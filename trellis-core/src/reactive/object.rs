//! Reactive objects.
//!
//! A [`ReactiveObject`] wraps a JSON object and gives every field its own
//! [`Signal`], so a computation that reads `user.name` is not invalidated by a
//! write to `user.age`. Adding or removing a key bumps a separate shape
//! signal, which is what whole-object reads such as [`ReactiveObject::to_value`]
//! depend on.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::runtime::Runtime;
use super::signal::Signal;
use super::subscriber::next_source_id;

/// Multi-field reactive container.
#[derive(Clone)]
pub struct ReactiveObject {
    shape_id: u64,
    fields: Arc<RwLock<IndexMap<String, Signal<Value>>>>,
}

impl ReactiveObject {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            shape_id: next_source_id(),
            fields: Arc::new(RwLock::new(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Signal::new(value)))
                    .collect(),
            )),
        }
    }

    /// Wrap a JSON object. Returns `None` for any other JSON kind.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map)),
            _ => None,
        }
    }

    /// Read one field, tracking it and the object's shape, so adding or
    /// removing the key is seen too.
    pub fn get(&self, key: &str) -> Option<Value> {
        Runtime::track_read(self.shape_id);
        self.field(key).map(|signal| signal.get())
    }

    /// Write one field, creating it if absent.
    pub fn set(&self, key: &str, value: Value) {
        if let Some(signal) = self.field(key) {
            signal.set(value);
            return;
        }
        self.fields
            .write()
            .insert(key.to_owned(), Signal::new(value));
        Runtime::notify_source_change(self.shape_id);
    }

    /// Remove a field, returning its last value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.fields.write().shift_remove(key)?;
        Runtime::notify_source_change(self.shape_id);
        Some(removed.get_untracked())
    }

    /// Write every field of `values`; existing fields not named are kept.
    pub fn assign(&self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    /// Make the object hold exactly `values`: missing keys are removed, the
    /// rest are written through their existing signals.
    pub fn replace(&self, values: Map<String, Value>) {
        let reshaped = {
            let mut fields = self.fields.write();
            let before = fields.len();
            fields.retain(|key, _| values.contains_key(key));
            before != fields.len()
        };
        if reshaped {
            Runtime::notify_source_change(self.shape_id);
        }
        self.assign(values);
    }

    /// The live signal behind one field (a reference bound to that field).
    pub fn field(&self, key: &str) -> Option<Signal<Value>> {
        self.fields.read().get(key).cloned()
    }

    /// Current keys in insertion order, tracking the object's shape.
    pub fn keys(&self) -> Vec<String> {
        Runtime::track_read(self.shape_id);
        self.fields.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// Snapshot of the whole object, tracking the shape and every field.
    pub fn to_value(&self) -> Value {
        Runtime::track_read(self.shape_id);
        let fields: Vec<(String, Signal<Value>)> = self
            .fields
            .read()
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect();
        Value::Object(fields.into_iter().map(|(k, s)| (k, s.get())).collect())
    }

    /// Untracked snapshot: the raw, non-reactive counterpart.
    pub fn to_raw(&self) -> Value {
        Value::Object(
            self.fields
                .read()
                .iter()
                .map(|(k, s)| (k.clone(), s.get_untracked()))
                .collect(),
        )
    }

    /// Whether two handles wrap the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl std::fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReactiveObject").field(&self.to_raw()).finish()
    }
}

impl Serialize for ReactiveObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::reactive::Memo;

    fn object(value: Value) -> ReactiveObject {
        ReactiveObject::from_value(value).unwrap()
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(ReactiveObject::from_value(json!([1, 2])).is_none());
        assert!(ReactiveObject::from_value(json!(3)).is_none());
    }

    #[test]
    fn get_and_set_fields() {
        let user = object(json!({"name": "ada", "age": 36}));
        assert_eq!(user.get("name"), Some(json!("ada")));

        user.set("age", json!(37));
        user.set("email", json!("ada@example.com"));
        assert_eq!(user.to_raw(), json!({"name": "ada", "age": 37, "email": "ada@example.com"}));
        assert_eq!(user.keys(), vec!["name", "age", "email"]);
    }

    #[test]
    fn field_reference_reads_and_writes_through() {
        let point = object(json!({"x": 1}));
        let x = point.field("x").unwrap();

        x.set(json!(5));
        assert_eq!(point.get("x"), Some(json!(5)));

        point.set("x", json!(9));
        assert_eq!(x.get(), json!(9));
    }

    #[test]
    fn field_reads_are_tracked_per_field() {
        let point = object(json!({"x": 1, "y": 2}));
        let x_only = {
            let point = point.clone();
            Memo::new(move || point.get("x").unwrap_or(Value::Null))
        };
        assert_eq!(x_only.get(), json!(1));

        point.set("y", json!(20));
        assert_eq!(x_only.state(), crate::reactive::MemoState::Clean);

        point.set("x", json!(10));
        assert_eq!(x_only.get(), json!(10));
    }

    #[test]
    fn whole_object_reads_see_new_keys() {
        let bag = object(json!({}));
        let snapshot = {
            let bag = bag.clone();
            Memo::new(move || bag.to_value())
        };
        assert_eq!(snapshot.get(), json!({}));

        bag.set("a", json!(1));
        assert_eq!(snapshot.get(), json!({"a": 1}));

        assert_eq!(bag.remove("a"), Some(json!(1)));
        assert_eq!(snapshot.get(), json!({}));
    }

    #[test]
    fn replace_drops_missing_keys() {
        let point = object(json!({"x": 1, "y": 2}));
        let x = {
            let point = point.clone();
            Memo::new(move || point.get("x").unwrap_or(Value::Null))
        };
        let snapshot = {
            let point = point.clone();
            Memo::new(move || point.to_value())
        };
        let y = point.field("y").unwrap();
        assert_eq!(x.get(), json!(1));
        assert_eq!(snapshot.get(), json!({"x": 1, "y": 2}));

        point.replace(json!({"y": 20, "z": 3}).as_object().cloned().unwrap());
        assert_eq!(point.to_raw(), json!({"y": 20, "z": 3}));
        assert_eq!(x.get(), Value::Null);
        assert_eq!(snapshot.get(), json!({"y": 20, "z": 3}));
        // Kept keys are written through the signal already handed out.
        assert_eq!(y.get(), json!(20));

        point.replace(Map::new());
        assert!(point.is_empty());
        assert_eq!(snapshot.get(), json!({}));
    }
}

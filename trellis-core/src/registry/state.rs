//! The shared state tree.
//!
//! One slice per store id. A slice holds the store's own signals and reactive
//! objects, not copies, so a write through the store is visible in the tree
//! and the other way round.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::reactive::{ReactiveObject, Signal};

/// One mirrored field.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum StateEntry {
    Ref(Signal<Value>),
    Reactive(ReactiveObject),
}

impl StateEntry {
    /// Current value, tracked.
    pub fn get(&self) -> Value {
        match self {
            Self::Ref(signal) => signal.get(),
            Self::Reactive(object) => object.to_value(),
        }
    }

    /// Whether this entry is the same cell as `other`.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ref(a), Self::Ref(b)) => a.ptr_eq(b),
            (Self::Reactive(a), Self::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// The mirrored state of one store.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct StateSlice {
    entries: IndexMap<String, StateEntry>,
}

impl StateSlice {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: String, entry: StateEntry) {
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<&StateEntry> {
        self.entries.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot as a JSON object, tracked.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(name, entry)| (name.clone(), entry.get()))
                .collect(),
        )
    }
}

/// How a committed slice lands in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SliceWrite {
    /// Options stores: the fresh state replaces any previous slice.
    Replace,
    /// Setup stores: entries are added to the existing slice, if any.
    Merge,
}

/// Store id to state slice, in first-commit order.
#[derive(Clone, Default)]
pub struct StateTree {
    slices: Arc<RwLock<IndexMap<String, StateSlice>>>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slice for `id`, sharing its cells with the live store.
    pub fn slice(&self, id: &str) -> Option<StateSlice> {
        self.slices.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slices.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.slices.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.read().is_empty()
    }

    /// JSON snapshot of one slice.
    pub fn slice_snapshot(&self, id: &str) -> Option<Value> {
        self.slice(id).map(|slice| slice.to_value())
    }

    /// JSON snapshot of the whole tree, keyed by store id.
    pub fn snapshot(&self) -> Value {
        let slices: Vec<(String, StateSlice)> = self
            .slices
            .read()
            .iter()
            .map(|(id, slice)| (id.clone(), slice.clone()))
            .collect();
        let tree: Map<String, Value> = slices
            .into_iter()
            .map(|(id, slice)| (id, slice.to_value()))
            .collect();
        Value::Object(tree)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// MessagePack encoding of the snapshot, with field names.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(&self.snapshot())?)
    }

    pub(crate) fn apply(&self, id: &str, slice: StateSlice, write: SliceWrite) {
        let mut slices = self.slices.write();
        match write {
            SliceWrite::Replace => {
                slices.insert(id.to_owned(), slice);
            }
            SliceWrite::Merge => {
                let target = slices.entry(id.to_owned()).or_default();
                target.entries.extend(slice.entries);
            }
        }
    }

    pub(crate) fn remove(&self, id: &str) -> Option<StateSlice> {
        self.slices.write().shift_remove(id)
    }
}

impl std::fmt::Debug for StateTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTree").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_slice(signal: &Signal<Value>) -> StateSlice {
        let mut slice = StateSlice::new();
        slice.insert("count".into(), StateEntry::Ref(signal.clone()));
        slice
    }

    #[test]
    fn slices_share_cells_with_their_source() {
        let tree = StateTree::new();
        let count = Signal::new(json!(0));
        tree.apply("counter", counter_slice(&count), SliceWrite::Replace);

        assert_eq!(tree.slice_snapshot("counter"), Some(json!({"count": 0})));
        count.set(json!(4));
        assert_eq!(tree.snapshot(), json!({"counter": {"count": 4}}));

        let entry = tree.slice("counter").unwrap().get("count").cloned().unwrap();
        assert!(entry.ptr_eq(&StateEntry::Ref(count)));
    }

    #[test]
    fn replace_drops_old_entries_and_merge_keeps_them() {
        let tree = StateTree::new();
        let a = Signal::new(json!(1));
        let b = Signal::new(json!(2));

        let mut first = StateSlice::new();
        first.insert("a".into(), StateEntry::Ref(a));
        tree.apply("s", first, SliceWrite::Merge);

        let mut second = StateSlice::new();
        second.insert("b".into(), StateEntry::Ref(b.clone()));
        tree.apply("s", second.clone(), SliceWrite::Merge);
        assert_eq!(tree.slice_snapshot("s"), Some(json!({"a": 1, "b": 2})));

        tree.apply("s", second, SliceWrite::Replace);
        assert_eq!(tree.slice_snapshot("s"), Some(json!({"b": 2})));
    }

    #[test]
    fn serializes_to_json_and_msgpack() {
        let tree = StateTree::new();
        let object = ReactiveObject::from_value(json!({"x": 1})).unwrap();
        let mut slice = StateSlice::new();
        slice.insert("point".into(), StateEntry::Reactive(object));
        tree.apply("geo", slice, SliceWrite::Replace);

        assert_eq!(tree.to_json().unwrap(), r#"{"geo":{"point":{"x":1}}}"#);

        let bytes = tree.to_msgpack().unwrap();
        let decoded: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, json!({"geo": {"point": {"x": 1}}}));
    }

    #[test]
    fn remove_forgets_the_slice() {
        let tree = StateTree::new();
        tree.apply("s", StateSlice::new(), SliceWrite::Merge);
        assert!(tree.contains("s"));
        assert!(tree.remove("s").is_some());
        assert!(tree.is_empty());
    }
}

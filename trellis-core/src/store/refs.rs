//! Destructuring a store into live references.

use indexmap::IndexMap;
use serde_json::Value;

use super::field::StoreField;
use super::instance::Store;
use crate::error::{json_kind, Result, StoreError};
use crate::reactive::{Memo, ReactiveObject, Signal};

/// A live reference to one reactive store field.
#[derive(Clone, Debug)]
pub enum StoreRef {
    Ref(Signal<Value>),
    /// Read-only; `id` and `field` name it in errors.
    Computed {
        id: String,
        field: String,
        memo: Memo<Value>,
    },
    Reactive(ReactiveObject),
}

impl StoreRef {
    /// Current value, tracked.
    pub fn get(&self) -> Value {
        match self {
            Self::Ref(signal) => signal.get(),
            Self::Computed { memo, .. } => memo.get(),
            Self::Reactive(object) => object.to_value(),
        }
    }

    /// Write through to the store field, the same as [`Store::set`].
    /// Computed references are read-only.
    pub fn set(&self, value: Value) -> Result<()> {
        match self {
            Self::Ref(signal) => {
                signal.set(value);
                Ok(())
            }
            Self::Computed { id, field, .. } => Err(StoreError::ReadOnly {
                id: id.clone(),
                field: field.clone(),
            }),
            Self::Reactive(object) => match value {
                Value::Object(map) => {
                    object.replace(map);
                    Ok(())
                }
                other => Err(StoreError::TypeMismatch {
                    expected: "an object",
                    found: json_kind(&other),
                }),
            },
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed { .. })
    }
}

/// Every reference, computed value and reactive object of `store`, keyed by
/// field name. Actions and plain data are left out.
///
/// The references are the store's own cells, not snapshots.
pub fn store_to_refs(store: &Store) -> IndexMap<String, StoreRef> {
    store
        .fields()
        .into_iter()
        .filter_map(|(name, field)| {
            let reference = match field {
                StoreField::Ref(signal) => StoreRef::Ref(signal),
                StoreField::Computed(memo) => StoreRef::Computed {
                    id: store.id().to_owned(),
                    field: name.clone(),
                    memo,
                },
                StoreField::Reactive(object) => StoreRef::Reactive(object),
                StoreField::Action(_) | StoreField::Plain(_) => return None,
            };
            Some((name, reference))
        })
        .collect()
}

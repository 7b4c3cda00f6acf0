//! Store instances.
//!
//! A [`Store`] is a cheap, cloneable handle. All clones obtained from the same
//! registry slot are the same instance ([`Store::ptr_eq`]). Construction is
//! two-phase: the builder first creates an empty shell so getters and actions
//! can capture a weak handle to it, then populates the fields once every
//! section has been wrapped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use futures_util::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::descriptor::StateFn;
use super::dispose::Dispose;
use super::field::{Action, StoreField};
use crate::error::{json_kind, Result, StoreError};
use crate::reactive::{Effect, EffectScope, ReactiveContext};

/// Identity of a store definition, used to notice same-id redefinitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DefinitionId(u64);

impl DefinitionId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) struct StoreInner {
    id: String,
    scope: EffectScope,
    definition: DefinitionId,
    fields: RwLock<IndexMap<String, StoreField>>,
    dispose: OnceLock<Dispose>,
    /// Options stores keep their initializer for `reset`.
    state_fn: Option<StateFn>,
}

/// A live store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning handle captured by getters and actions.
#[derive(Clone)]
pub struct WeakStore {
    id: Arc<str>,
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }

    pub(crate) fn upgrade_or_err(&self) -> Result<Store> {
        self.upgrade().ok_or_else(|| StoreError::StoreDropped {
            id: self.id.to_string(),
        })
    }
}

/// Payload delivered to [`Store::subscribe`] callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub store_id: String,
    pub state: Value,
}

/// A running `subscribe` callback.
#[derive(Debug, Clone)]
pub struct Subscription {
    effect: Effect,
}

impl Subscription {
    pub fn stop(&self) {
        self.effect.dispose();
    }

    pub fn is_active(&self) -> bool {
        !self.effect.is_disposed()
    }
}

impl Store {
    pub(crate) fn shell(
        id: &str,
        scope: EffectScope,
        definition: DefinitionId,
        state_fn: Option<StateFn>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: id.to_owned(),
                scope,
                definition,
                fields: RwLock::new(IndexMap::new()),
                dispose: OnceLock::new(),
                state_fn,
            }),
        }
    }

    /// Second construction phase: install the projected fields plus `$id`
    /// and `$dispose`.
    pub(crate) fn populate(&self, fields: IndexMap<String, StoreField>, dispose: Dispose) {
        let weak = self.downgrade();
        let dispose_action = Action::new(move |_| {
            if let Some(store) = weak.upgrade() {
                store.dispose();
            }
            Ok(Value::Null)
        })
        .named("$dispose");

        {
            let mut map = self.inner.fields.write();
            map.extend(fields);
            map.insert("$dispose".to_owned(), StoreField::Action(dispose_action));
            map.insert("$id".to_owned(), StoreField::Plain(Value::String(self.inner.id.clone())));
        }
        let _ = self.inner.dispose.set(dispose);
    }

    /// The store id (`$id`).
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The scope owning this store's memos and effects.
    pub fn scope(&self) -> EffectScope {
        self.inner.scope
    }

    pub(crate) fn definition(&self) -> DefinitionId {
        self.inner.definition
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            id: Arc::from(self.inner.id.as_str()),
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles are the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// False once the store has been disposed or its registry torn down.
    pub fn is_active(&self) -> bool {
        self.inner.scope.is_active()
    }

    /// Tear the store down (`$dispose`): stop its scope and drop it from the
    /// registry. Safe to call repeatedly.
    pub fn dispose(&self) {
        if let Some(dispose) = self.inner.dispose.get() {
            dispose.call();
        }
    }

    pub fn field(&self, name: &str) -> Option<StoreField> {
        self.inner.fields.read().get(name).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// Snapshot of the raw field map.
    pub fn fields(&self) -> IndexMap<String, StoreField> {
        self.inner.fields.read().clone()
    }

    /// Read a field. `None` for unknown names and for actions.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.field(name)?.read()
    }

    /// Read a field and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Write a field. References, reactive objects and plain data are writable.
    ///
    /// A reactive object takes on exactly the keys of `value`; use
    /// [`Store::patch`] to merge instead.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        match self.field(name).ok_or_else(|| self.unknown(name))? {
            StoreField::Ref(signal) => signal.set(value),
            StoreField::Reactive(object) => match value {
                Value::Object(map) => object.replace(map),
                other => {
                    return Err(StoreError::TypeMismatch {
                        expected: "an object",
                        found: json_kind(&other),
                    })
                }
            },
            StoreField::Plain(_) if name.starts_with('$') => return Err(self.read_only(name)),
            StoreField::Plain(_) => {
                self.inner
                    .fields
                    .write()
                    .insert(name.to_owned(), StoreField::Plain(value));
            }
            StoreField::Computed(_) | StoreField::Action(_) => return Err(self.read_only(name)),
        }
        Ok(())
    }

    /// Modify a field in place.
    pub fn update<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        match self.field(name).ok_or_else(|| self.unknown(name))? {
            StoreField::Ref(signal) => {
                signal.update(f);
                Ok(())
            }
            StoreField::Reactive(object) => {
                let mut value = object.to_raw();
                f(&mut value);
                self.set(name, value)
            }
            StoreField::Plain(mut value) => {
                f(&mut value);
                self.set(name, value)
            }
            StoreField::Computed(_) | StoreField::Action(_) => Err(self.read_only(name)),
        }
    }

    /// Detached handle to an action; calling it is the same as [`Store::call`].
    pub fn action(&self, name: &str) -> Option<Action> {
        match self.field(name)? {
            StoreField::Action(action) => Some(action),
            _ => None,
        }
    }

    fn require_action(&self, name: &str) -> Result<Action> {
        match self.field(name).ok_or_else(|| self.unknown(name))? {
            StoreField::Action(action) => Ok(action),
            _ => Err(StoreError::NotAnAction {
                id: self.inner.id.clone(),
                field: name.to_owned(),
            }),
        }
    }

    /// Invoke a synchronous action.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.require_action(name)?.call(args)
    }

    /// Invoke an action of either kind.
    pub fn call_async(&self, name: &str, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        match self.require_action(name) {
            Ok(action) => action.call_async(args),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    /// The serializable state (`$state`): references that are not derived and
    /// reactive objects. Reads are tracked.
    pub fn state(&self) -> Value {
        let fields = self.fields();
        let state: Map<String, Value> = fields
            .into_iter()
            .filter(|(_, field)| field.is_state())
            .filter_map(|(name, field)| field.read().map(|value| (name, value)))
            .collect();
        Value::Object(state)
    }

    /// Write several state fields at once (`$patch`).
    ///
    /// Every key is validated before anything is written. Reactive objects
    /// are merged: keys not named in the patch are kept.
    pub fn patch(&self, values: Value) -> Result<()> {
        let values = match values {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::TypeMismatch {
                    expected: "an object",
                    found: json_kind(&other),
                })
            }
        };

        for (name, value) in &values {
            match self.field(name).ok_or_else(|| self.unknown(name))? {
                StoreField::Ref(_) => {}
                StoreField::Reactive(_) if value.is_object() => {}
                StoreField::Reactive(_) => {
                    return Err(StoreError::TypeMismatch {
                        expected: "an object",
                        found: json_kind(value),
                    })
                }
                _ => return Err(self.read_only(name)),
            }
        }

        for (name, value) in values {
            match (self.field(&name), value) {
                (Some(StoreField::Reactive(object)), Value::Object(map)) => object.assign(map),
                (_, value) => self.set(&name, value)?,
            }
        }
        Ok(())
    }

    /// Restore the initial state (`$reset`). Only options stores can reset.
    pub fn reset(&self) -> Result<()> {
        let init = self
            .inner
            .state_fn
            .as_ref()
            .ok_or_else(|| StoreError::ResetUnsupported {
                id: self.inner.id.clone(),
            })?;

        let fresh = match ReactiveContext::untracked(|| init())? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidState {
                    id: self.inner.id.clone(),
                    found: json_kind(&other),
                })
            }
        };

        for (name, value) in fresh {
            if let Some(StoreField::Ref(signal)) = self.field(&name) {
                signal.set(value);
            }
        }
        tracing::debug!(store_id = %self.inner.id, "store state reset");
        Ok(())
    }

    /// Call `callback` after every change to the store's state (`$subscribe`).
    ///
    /// The subscription lives in the store's scope and ends when the store is
    /// disposed.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let weak = self.downgrade();
        let store_id = self.inner.id.clone();
        let primed = AtomicBool::new(false);

        let effect = self
            .inner
            .scope
            .run(|| {
                Effect::new(move || {
                    let Some(store) = weak.upgrade() else {
                        return;
                    };
                    let state = store.state();
                    if !primed.swap(true, Ordering::SeqCst) {
                        return;
                    }
                    let change = StateChange {
                        store_id: store_id.clone(),
                        state,
                    };
                    ReactiveContext::untracked(|| callback(&change));
                })
            })
            .ok_or_else(|| StoreError::Disposed {
                id: self.inner.id.clone(),
            })?;

        Ok(Subscription { effect })
    }

    fn unknown(&self, name: &str) -> StoreError {
        StoreError::UnknownField {
            id: self.inner.id.clone(),
            field: name.to_owned(),
        }
    }

    fn read_only(&self, name: &str) -> StoreError {
        StoreError::ReadOnly {
            id: self.inner.id.clone(),
            field: name.to_owned(),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("fields", &self.keys())
            .finish()
    }
}

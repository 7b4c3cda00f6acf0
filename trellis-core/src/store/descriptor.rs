//! Store descriptors.
//!
//! A store is declared in one of two styles, discriminated once when the
//! store is defined:
//!
//! - [`OptionsStore`]: a state initializer plus named getters and actions.
//!   Getters and actions receive the store itself.
//! - A setup function returning a [`SetupStore`]: an arbitrary set of
//!   references, reactive objects, memos, actions and plain values.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;

use super::field::{Action, StoreField};
use super::instance::{Store, WeakStore};
use crate::error::{Result, StoreError};
use crate::reactive::{Memo, ReactiveObject, Signal};

pub type StateFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;
pub type GetterFn = Arc<dyn Fn(&Store) -> Value + Send + Sync>;
pub type SetupFn = Arc<dyn Fn() -> Result<SetupStore> + Send + Sync>;

type SyncOptionsAction = dyn Fn(&Store, &[Value]) -> Result<Value> + Send + Sync;
type AsyncOptionsAction = dyn Fn(Store, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// An action as declared on an options store, before it is bound.
#[derive(Clone)]
pub(crate) enum OptionsAction {
    Sync(Arc<SyncOptionsAction>),
    Async(Arc<AsyncOptionsAction>),
}

impl OptionsAction {
    /// Bind to a store under construction.
    pub(crate) fn bind(&self, name: &str, store: WeakStore) -> Action {
        let action = match self {
            Self::Sync(f) => {
                let f = f.clone();
                Action::new(move |args| {
                    let store = store.upgrade_or_err()?;
                    f(&store, args)
                })
            }
            Self::Async(f) => {
                let f = f.clone();
                Action::from_boxed_async(Arc::new(move |args| match store.upgrade_or_err() {
                    Ok(store) => f(store, args),
                    Err(err) => future::ready(Err::<Value, _>(err)).boxed(),
                }))
            }
        };
        action.named(name)
    }
}

/// Options-style declaration: `state`, `getters` and `actions`.
#[derive(Clone, Default)]
pub struct OptionsStore {
    state: Option<StateFn>,
    getters: IndexMap<String, GetterFn>,
    actions: IndexMap<String, OptionsAction>,
    duplicates: Vec<String>,
}

impl OptionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state initializer. It must return a JSON object.
    pub fn state<F>(self, init: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.try_state(move || Ok(init()))
    }

    /// Set a fallible state initializer.
    pub fn try_state<F>(mut self, init: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(init));
        self
    }

    /// Add a derived value. The getter receives the store it belongs to.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Store) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        self.note_name(&name);
        self.getters.insert(name, Arc::new(getter));
        self
    }

    /// Add a synchronous action. The action receives the store it belongs to.
    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        self.note_name(&name);
        self.actions.insert(name, OptionsAction::Sync(Arc::new(action)));
        self
    }

    /// Add an asynchronous action. It receives an owned store handle so it can
    /// hold on to it across await points.
    pub fn async_action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Store, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        self.note_name(&name);
        self.actions.insert(
            name,
            OptionsAction::Async(Arc::new(move |store, args| action(store, args).boxed())),
        );
        self
    }

    fn note_name(&mut self, name: &str) {
        if self.getters.contains_key(name) || self.actions.contains_key(name) {
            self.duplicates.push(name.to_owned());
        }
    }

    pub(crate) fn state_fn(&self) -> Option<StateFn> {
        self.state.clone()
    }

    pub(crate) fn getters(&self) -> &IndexMap<String, GetterFn> {
        &self.getters
    }

    pub(crate) fn actions(&self) -> &IndexMap<String, OptionsAction> {
        &self.actions
    }

    /// Reject getter/action collisions and reserved names.
    pub(crate) fn validate(&self, id: &str) -> Result<()> {
        if let Some(field) = self.duplicates.first() {
            return Err(StoreError::FieldCollision {
                id: id.to_owned(),
                field: field.clone(),
            });
        }
        for name in self.getters.keys().chain(self.actions.keys()) {
            check_name(id, name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for OptionsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsStore")
            .field("state", &self.state.is_some())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a setup function returns.
#[derive(Clone, Default, Debug)]
pub struct SetupStore {
    fields: IndexMap<String, StoreField>,
    duplicates: Vec<String>,
}

impl SetupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<StoreField>) -> Self {
        let name = name.into();
        let field = match field.into() {
            StoreField::Action(action) => StoreField::Action(action.named(&name)),
            other => other,
        };
        if self.fields.insert(name.clone(), field).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    pub fn signal(self, name: impl Into<String>, signal: Signal<Value>) -> Self {
        self.field(name, signal)
    }

    pub fn reactive(self, name: impl Into<String>, object: ReactiveObject) -> Self {
        self.field(name, object)
    }

    pub fn computed(self, name: impl Into<String>, memo: Memo<Value>) -> Self {
        self.field(name, memo)
    }

    pub fn action(self, name: impl Into<String>, action: Action) -> Self {
        self.field(name, action)
    }

    pub fn plain(self, name: impl Into<String>, value: Value) -> Self {
        self.field(name, value)
    }

    pub(crate) fn into_parts(self) -> (IndexMap<String, StoreField>, Vec<String>) {
        (self.fields, self.duplicates)
    }
}

/// A store declaration in either style.
#[derive(Clone)]
pub enum StoreDescriptor {
    Options(OptionsStore),
    Setup(SetupFn),
}

impl StoreDescriptor {
    /// Declare a store with a setup function. The function runs once per
    /// build, inside the store's scope.
    pub fn setup<F>(setup: F) -> Self
    where
        F: Fn() -> Result<SetupStore> + Send + Sync + 'static,
    {
        Self::Setup(Arc::new(setup))
    }
}

impl From<OptionsStore> for StoreDescriptor {
    fn from(options: OptionsStore) -> Self {
        Self::Options(options)
    }
}

impl fmt::Debug for StoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
            Self::Setup(_) => f.write_str("Setup(..)"),
        }
    }
}

/// Names starting with `$` belong to the store itself (`$id`, `$dispose`).
pub(crate) fn check_name(id: &str, name: &str) -> Result<()> {
    if name.starts_with('$') {
        return Err(StoreError::ReservedField {
            id: id.to_owned(),
            field: name.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_collisions_are_recorded() {
        let options = OptionsStore::new()
            .getter("total", |_| json!(0))
            .action("total", |_, _| Ok(Value::Null));

        match options.validate("cart") {
            Err(StoreError::FieldCollision { id, field }) => {
                assert_eq!(id, "cart");
                assert_eq!(field, "total");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reserved_names_are_rejected() {
        let options = OptionsStore::new().action("$reset", |_, _| Ok(Value::Null));
        assert!(matches!(
            options.validate("cart"),
            Err(StoreError::ReservedField { .. })
        ));
    }

    #[test]
    fn setup_store_names_actions_and_records_duplicates() {
        let setup = SetupStore::new()
            .plain("label", json!("a"))
            .action("go", Action::new(|_| Ok(Value::Null)))
            .plain("label", json!("b"));

        let (fields, duplicates) = setup.into_parts();
        assert_eq!(duplicates, vec!["label".to_string()]);
        match fields.get("go") {
            Some(StoreField::Action(action)) => assert_eq!(action.name(), "go"),
            other => panic!("unexpected {other:?}"),
        }
    }
}

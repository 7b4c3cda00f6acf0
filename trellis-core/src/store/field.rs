//! Store fields.
//!
//! Every entry of a store is one of a small set of explicitly tagged kinds.
//! Classification for the shared state tree and for `store_to_refs` matches on
//! the tag; nothing is inferred from names or from the runtime.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::reactive::{Memo, ReactiveObject, Signal};

type SyncActionFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;
type AsyncActionFn = dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync;

#[derive(Clone)]
enum ActionKind {
    Sync(Arc<SyncActionFn>),
    Async(Arc<AsyncActionFn>),
}

/// A callable store entry.
///
/// Actions are bound when they are created: calling a clone detached from the
/// store behaves exactly like calling it through [`Store::call`](super::Store::call).
#[derive(Clone)]
pub struct Action {
    name: Arc<str>,
    kind: ActionKind,
}

impl Action {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from("anonymous"),
            kind: ActionKind::Sync(Arc::new(f)),
        }
    }

    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::from_boxed_async(Arc::new(move |args| f(args).boxed()))
    }

    pub(crate) fn from_boxed_async(f: Arc<AsyncActionFn>) -> Self {
        Self {
            name: Arc::from("anonymous"),
            kind: ActionKind::Async(f),
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_async(&self) -> bool {
        matches!(self.kind, ActionKind::Async(_))
    }

    /// Invoke a synchronous action.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match &self.kind {
            ActionKind::Sync(f) => f(args),
            ActionKind::Async(_) => Err(StoreError::AsyncAction {
                name: self.name.to_string(),
            }),
        }
    }

    /// Invoke any action. Synchronous actions run now and resolve immediately.
    pub fn call_async(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        match &self.kind {
            ActionKind::Sync(f) => future::ready(f(&args)).boxed(),
            ActionKind::Async(f) => f(args),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ActionKind::Sync(a), ActionKind::Sync(b)) => Arc::ptr_eq(a, b),
            (ActionKind::Async(a), ActionKind::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("async", &self.is_async())
            .finish()
    }
}

/// One named entry of a store.
#[derive(Clone)]
pub enum StoreField {
    /// Trackable reference. Mirrored into the shared state tree.
    Ref(Signal<Value>),
    /// Derived value. Readable, never serialized.
    Computed(Memo<Value>),
    /// Reactive object. Mirrored into the shared state tree.
    Reactive(ReactiveObject),
    Action(Action),
    /// Non-reactive data.
    Plain(Value),
}

impl StoreField {
    /// True for trackable references, derived ones included.
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_) | Self::Computed(_))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Reactive(_))
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }

    /// Whether the field belongs in the serializable state.
    pub fn is_state(&self) -> bool {
        matches!(self, Self::Ref(_) | Self::Reactive(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ref(_) => "a reference",
            Self::Computed(_) => "a computed value",
            Self::Reactive(_) => "a reactive object",
            Self::Action(_) => "an action",
            Self::Plain(_) => "plain data",
        }
    }

    /// Current value, tracked. Actions have none.
    pub fn read(&self) -> Option<Value> {
        match self {
            Self::Ref(signal) => Some(signal.get()),
            Self::Computed(memo) => Some(memo.get()),
            Self::Reactive(object) => Some(object.to_value()),
            Self::Action(_) => None,
            Self::Plain(value) => Some(value.clone()),
        }
    }
}

impl fmt::Debug for StoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(signal) => f.debug_tuple("Ref").field(&signal.get_untracked()).finish(),
            Self::Computed(memo) => f.debug_tuple("Computed").field(&memo.id()).finish(),
            Self::Reactive(object) => f.debug_tuple("Reactive").field(&object.to_raw()).finish(),
            Self::Action(action) => f.debug_tuple("Action").field(&action.name()).finish(),
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
        }
    }
}

impl From<Signal<Value>> for StoreField {
    fn from(signal: Signal<Value>) -> Self {
        Self::Ref(signal)
    }
}

impl From<Memo<Value>> for StoreField {
    fn from(memo: Memo<Value>) -> Self {
        Self::Computed(memo)
    }
}

impl From<ReactiveObject> for StoreField {
    fn from(object: ReactiveObject) -> Self {
        Self::Reactive(object)
    }
}

impl From<Action> for StoreField {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl From<Value> for StoreField {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

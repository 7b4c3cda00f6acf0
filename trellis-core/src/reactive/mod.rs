//! Reactive Primitives
//!
//! This module implements the reactive system the store layer is built on:
//! signals, memos, effects, reactive objects and effect scopes.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change.
//!
//! ## Reactive objects
//!
//! A multi-field container where each field is tracked on its own.
//!
//! ## Effect scopes
//!
//! A scope captures the memos and effects created while it runs and disposes
//! them all when it stops. Scopes nest; stopping a parent stops its children.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a source is read, we check if there is an active
//! tracking context and, if so, register the dependency with the runtime.

mod context;
mod effect;
mod memo;
mod object;
mod runtime;
mod scope;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use object::ReactiveObject;
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use scope::{on_scope_dispose, EffectScope, ScopeId};
pub use signal::Signal;
pub use subscriber::SubscriberId;

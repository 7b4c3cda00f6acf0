//! Trellis Core
//!
//! This crate provides a store registry and lifecycle manager on top of a
//! small fine-grained reactive runtime. It implements:
//!
//! - Reactive primitives (signals, memos, effects, reactive objects, effect scopes)
//! - Store declarations in options style or setup style
//! - A registry that builds stores lazily, caches them and mirrors their state
//!   into a shared, serializable state tree
//! - Scope-based disposal of everything a store created
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `app`: Application context with typed provide/inject
//! - `registry`: The root scope, the id → store map and the state tree
//! - `store`: Definitions, construction, store instances and `store_to_refs`
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::{json, Value};
//! use trellis_core::{create_registry, define_store, App, OptionsStore};
//!
//! let app = App::new();
//! app.with(&create_registry());
//!
//! let counter = define_store(
//!     "counter",
//!     OptionsStore::new()
//!         .state(|| json!({ "count": 0 }))
//!         .getter("double", |s| json!(s.get_as::<i64>("count").unwrap_or(0) * 2))
//!         .action("inc", |s, _| {
//!             s.update("count", |v| *v = json!(v.as_i64().unwrap_or(0) + 1))?;
//!             Ok(Value::Null)
//!         }),
//! )?;
//!
//! let store = counter.use_store(&app)?;
//! store.call("inc", &[])?;
//! assert_eq!(store.get("double"), Some(json!(2)));
//!
//! store.dispose();
//! assert_eq!(counter.use_store(&app)?.get("count"), Some(json!(0)));
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod reactive;
pub mod registry;
pub mod store;

pub use app::{App, InjectionKey, Install};
pub use config::{RedefinitionPolicy, RegistryConfig};
pub use error::{BoxError, Result, StoreError};
pub use reactive::{Effect, EffectScope, Memo, ReactiveObject, Signal};
pub use registry::{create_registry, Registry, StateTree, REGISTRY_KEY};
pub use store::{
    create_dispose, define_store, store_to_refs, Action, OptionsStore, SetupStore, StateChange,
    Store, StoreDefinition, StoreDescriptor, StoreField, StoreRef, Subscription,
};

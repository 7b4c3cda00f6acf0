//! Stores
//!
//! A store is a named bundle of reactive state, derived values and actions,
//! built lazily the first time it is used and cached in a [`Registry`] until
//! it is disposed.
//!
//! # Lifecycle
//!
//! 1. [`define_store`] validates the id and descriptor. Nothing is built.
//! 2. [`StoreDefinition::use_store`] resolves the registry. If the id is not
//!    cached it builds the store in a fresh child scope of the registry root:
//!    the descriptor is projected into fields, the store is populated, and
//!    the store and its state slice are committed together.
//! 3. [`Store::dispose`] stops the store's scope (releasing every memo and
//!    effect it owns) and removes the registry entry. The next `use_store`
//!    builds a new instance from the same descriptor.
//!
//! [`Registry`]: crate::registry::Registry

mod builder;
mod definition;
mod descriptor;
mod dispose;
mod field;
mod instance;
mod projector;
mod refs;

pub use definition::{define_store, StoreDefinition};
pub use descriptor::{GetterFn, OptionsStore, SetupFn, SetupStore, StateFn, StoreDescriptor};
pub use dispose::{create_dispose, Dispose};
pub use field::{Action, StoreField};
pub use instance::{StateChange, Store, Subscription, WeakStore};
pub use refs::{store_to_refs, StoreRef};

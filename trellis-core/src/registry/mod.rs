//! The store registry.
//!
//! A [`Registry`] is the root every store hangs off:
//!
//! - a root [`EffectScope`]; each store's scope is a child of it, so stopping
//!   the root stops every store
//! - the id → store map, in first-access order
//! - the shared [`StateTree`]
//!
//! Only the store builder (on commit) and the dispose path (on release)
//! write the map and the tree. When both are needed the map lock is taken
//! first.

mod state;

pub use state::{StateEntry, StateSlice, StateTree};
pub(crate) use state::SliceWrite;

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::app::{App, InjectionKey, Install};
use crate::config::RegistryConfig;
use crate::error::{Result, StoreError};
use crate::reactive::EffectScope;
use crate::store::Store;

/// Key the registry is provided under.
pub const REGISTRY_KEY: InjectionKey<Registry> = InjectionKey::new("trellis.registry");

pub(crate) struct RegistryInner {
    root: EffectScope,
    stores: RwLock<IndexMap<String, Store>>,
    state: StateTree,
    config: RegistryConfig,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.root.stop();
    }
}

/// Handle to a registry. Clones share the same root.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                root: EffectScope::detached(),
                stores: RwLock::new(IndexMap::new()),
                state: StateTree::new(),
                config,
            }),
        }
    }

    /// Publish this registry into `app` so accessors can find it.
    pub fn install(&self, app: &App) {
        app.provide(&REGISTRY_KEY, self.clone());
    }

    /// The registry installed in `app`.
    pub fn from_app(app: &App) -> Result<Self> {
        app.inject(&REGISTRY_KEY).ok_or(StoreError::MissingContext)
    }

    pub fn root_scope(&self) -> EffectScope {
        self.inner.root
    }

    /// The shared state tree.
    pub fn state(&self) -> &StateTree {
        &self.inner.state
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// The live store registered under `id`.
    pub fn get_store(&self, id: &str) -> Option<Store> {
        self.inner.stores.read().get(id).cloned()
    }

    pub fn has_store(&self, id: &str) -> bool {
        self.inner.stores.read().contains_key(id)
    }

    /// Registered ids in first-access order.
    pub fn store_ids(&self) -> Vec<String> {
        self.inner.stores.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.stores.read().is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.inner.root.is_active()
    }

    /// Stop the root scope, and with it every store, then clear the map.
    ///
    /// Accessors fail with [`StoreError::RegistryStopped`] afterwards.
    pub fn teardown(&self) {
        let count = self.len();
        self.inner.root.stop();
        self.inner.stores.write().clear();
        tracing::info!(stores = count, "registry torn down");
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<RegistryInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RegistryInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Register a freshly built store and its state slice in one step.
    ///
    /// If another build of the same id committed first, nothing is written and
    /// the winner comes back as `Err`.
    pub(crate) fn commit(
        &self,
        store: Store,
        slice: StateSlice,
        write: SliceWrite,
    ) -> std::result::Result<Store, Store> {
        let mut stores = self.inner.stores.write();
        if let Some(existing) = stores.get(store.id()) {
            return Err(existing.clone());
        }
        self.inner.state.apply(store.id(), slice, write);
        stores.insert(store.id().to_owned(), store.clone());
        Ok(store)
    }

    /// Drop the entry for `id` if it still belongs to `scope`.
    ///
    /// A dispose handle from an older instance finds a different scope and
    /// leaves the current entry alone.
    pub(crate) fn release(&self, id: &str, scope: EffectScope) -> bool {
        let mut stores = self.inner.stores.write();
        match stores.get(id) {
            Some(store) if store.scope() == scope => {}
            _ => return false,
        }
        stores.shift_remove(id);
        if !self.inner.config.retain_state_on_dispose {
            self.inner.state.remove(id);
        }
        true
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Install for Registry {
    fn install(&self, app: &App) {
        Registry::install(self, app);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("root", &self.inner.root.id())
            .field("stores", &self.store_ids())
            .field("state", &self.inner.state)
            .finish()
    }
}

/// Create a registry with the default configuration.
pub fn create_registry() -> Registry {
    Registry::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_resolve_from_app() {
        let app = App::new();
        assert!(matches!(
            Registry::from_app(&app),
            Err(StoreError::MissingContext)
        ));

        let registry = create_registry();
        app.with(&registry);
        assert!(Registry::from_app(&app).unwrap().ptr_eq(&registry));
    }

    #[test]
    fn fresh_registry_is_empty() {
        let registry = create_registry();
        assert!(registry.is_empty());
        assert!(registry.state().is_empty());
        assert!(registry.root_scope().is_active());
        assert_eq!(registry.config(), &RegistryConfig::default());
    }

    #[test]
    fn dropping_the_last_handle_stops_the_root() {
        let registry = create_registry();
        let root = registry.root_scope();
        let clone = registry.clone();

        drop(registry);
        assert!(root.is_active());
        drop(clone);
        assert!(!root.is_active());
    }

    #[test]
    fn teardown_stops_the_root() {
        let registry = create_registry();
        registry.teardown();
        assert!(!registry.is_active());
        assert!(registry.root_scope().child().is_none());
    }
}

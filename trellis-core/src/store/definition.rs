//! Store definitions and accessors.

use std::fmt;
use std::sync::Arc;

use super::builder::build_store;
use super::descriptor::StoreDescriptor;
use super::instance::{DefinitionId, Store};
use crate::app::App;
use crate::config::RedefinitionPolicy;
use crate::error::{Result, StoreError};
use crate::registry::Registry;

struct DefinitionInner {
    id: String,
    descriptor: StoreDescriptor,
    definition: DefinitionId,
}

/// A named store declaration.
///
/// Defining a store builds nothing. The first [`use_store`](Self::use_store)
/// against a registry builds the instance; later calls return the same one
/// until it is disposed.
#[derive(Clone)]
pub struct StoreDefinition {
    inner: Arc<DefinitionInner>,
}

/// Declare a store under `id`.
///
/// Fails for an empty id, and for an options store whose getters and actions
/// share a name or use a reserved `$` name.
pub fn define_store(id: impl Into<String>, descriptor: impl Into<StoreDescriptor>) -> Result<StoreDefinition> {
    let id = id.into();
    if id.is_empty() {
        return Err(StoreError::EmptyId);
    }

    let descriptor = descriptor.into();
    if let StoreDescriptor::Options(options) = &descriptor {
        options.validate(&id)?;
    }

    Ok(StoreDefinition {
        inner: Arc::new(DefinitionInner {
            id,
            descriptor,
            definition: DefinitionId::next(),
        }),
    })
}

impl StoreDefinition {
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn descriptor(&self) -> &StoreDescriptor {
        &self.inner.descriptor
    }

    /// Resolve the registry installed in `app`, then fetch or build the store.
    pub fn use_store(&self, app: &App) -> Result<Store> {
        let registry = Registry::from_app(app)?;
        self.use_in(&registry)
    }

    /// Fetch or build the store in an explicit registry.
    pub fn use_in(&self, registry: &Registry) -> Result<Store> {
        if let Some(store) = registry.get_store(&self.inner.id) {
            if store.definition() != self.inner.definition {
                self.redefined(registry.config().redefinition)?;
            }
            return Ok(store);
        }

        build_store(
            &self.inner.id,
            &self.inner.descriptor,
            self.inner.definition,
            registry,
        )
    }

    /// An accessor closure, for call sites that only hold an [`App`].
    pub fn accessor(&self) -> impl Fn(&App) -> Result<Store> + Clone + Send + Sync + 'static {
        let definition = self.clone();
        move |app: &App| definition.use_store(app)
    }

    fn redefined(&self, policy: RedefinitionPolicy) -> Result<()> {
        match policy {
            RedefinitionPolicy::Warn => {
                tracing::warn!(
                    store_id = %self.inner.id,
                    "store id is already registered from another definition; returning the cached store"
                );
                Ok(())
            }
            RedefinitionPolicy::Ignore => Ok(()),
            RedefinitionPolicy::Error => Err(StoreError::Redefined {
                id: self.inner.id.clone(),
            }),
        }
    }
}

impl fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("id", &self.inner.id)
            .field("descriptor", &self.inner.descriptor)
            .finish()
    }
}

//! Store teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use crate::reactive::EffectScope;
use crate::registry::{Registry, RegistryInner};

/// Teardown for one store instance: stops its scope, then removes its
/// registry entry. Every call after the first is a no-op.
pub struct Dispose {
    scope: EffectScope,
    registry: Weak<RegistryInner>,
    id: String,
    done: AtomicBool,
}

impl Dispose {
    pub fn call(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }

        self.scope.stop();
        if let Some(registry) = Registry::upgrade(&self.registry) {
            registry.release(&self.id, self.scope);
        }
        tracing::info!(store_id = %self.id, "store disposed");
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Dispose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispose")
            .field("id", &self.id)
            .field("scope", &self.scope.id())
            .field("done", &self.is_done())
            .finish()
    }
}

/// Build the teardown for the store `id` owned by `scope`.
///
/// The registry is held weakly; disposing after the registry is gone only
/// stops the scope.
pub fn create_dispose(scope: EffectScope, registry: &Registry, id: impl Into<String>) -> Dispose {
    Dispose {
        scope,
        registry: registry.downgrade(),
        id: id.into(),
        done: AtomicBool::new(false),
    }
}

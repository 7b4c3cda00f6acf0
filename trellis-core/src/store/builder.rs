//! Store construction.
//!
//! Building a store is all-or-nothing. User code (state initializer, setup
//! function) runs inside the new store's scope; if it fails or panics the
//! scope is stopped and the registry is never touched.

use super::descriptor::StoreDescriptor;
use super::dispose::create_dispose;
use super::instance::{DefinitionId, Store};
use super::projector::{project_options, project_setup};
use crate::error::{Result, StoreError};
use crate::reactive::{EffectScope, ReactiveContext};
use crate::registry::Registry;

/// Stops the scope on drop unless disarmed.
struct ScopeGuard {
    scope: EffectScope,
    armed: bool,
}

impl ScopeGuard {
    fn new(scope: EffectScope) -> Self {
        Self { scope, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.armed {
            self.scope.stop();
        }
    }
}

/// Build the store `id` and commit it to `registry`.
///
/// Returns the committed store, or the store another caller committed first.
pub(crate) fn build_store(
    id: &str,
    descriptor: &StoreDescriptor,
    definition: DefinitionId,
    registry: &Registry,
) -> Result<Store> {
    let span = tracing::debug_span!("build_store", store_id = %id);
    let _enter = span.enter();

    let scope = registry
        .root_scope()
        .child()
        .ok_or(StoreError::RegistryStopped)?;
    let guard = ScopeGuard::new(scope);

    let state_fn = match descriptor {
        StoreDescriptor::Options(options) => options.state_fn(),
        StoreDescriptor::Setup(_) => None,
    };
    let store = Store::shell(id, scope, definition, state_fn);

    // Untracked: an accessor called from inside an effect must not make that
    // effect depend on the new store's internals.
    let projection = scope
        .run(|| {
            ReactiveContext::untracked(|| match descriptor {
                StoreDescriptor::Options(options) => project_options(id, options, &store),
                StoreDescriptor::Setup(setup) => project_setup(id, setup),
            })
        })
        .ok_or(StoreError::RegistryStopped)??;

    store.populate(projection.fields, create_dispose(scope, registry, id));

    // Stopping the scope by any route, root teardown included, releases the entry.
    {
        let registry = registry.downgrade();
        let id = id.to_owned();
        scope.on_stop(move || {
            if let Some(registry) = Registry::upgrade(&registry) {
                registry.release(&id, scope);
            }
        });
    }

    match registry.commit(store, projection.slice, projection.write) {
        Ok(store) => {
            guard.disarm();
            tracing::debug!(fields = store.keys().len(), "store committed");
            Ok(store)
        }
        Err(existing) => {
            tracing::debug!("store committed concurrently, discarding this build");
            Ok(existing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    use crate::store::descriptor::{OptionsStore, SetupStore};
    use crate::store::field::Action;

    #[test]
    fn failed_build_leaves_no_trace() {
        let registry = Registry::new();
        let descriptor = StoreDescriptor::setup(|| Err(StoreError::failed("boom")));

        let err = build_store("broken", &descriptor, DefinitionId::next(), &registry).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(!registry.has_store("broken"));
        assert!(!registry.state().contains("broken"));
    }

    #[test]
    fn scope_created_for_a_failed_build_is_stopped() {
        let registry = Registry::new();
        let captured = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let descriptor = {
            let captured = captured.clone();
            StoreDescriptor::setup(move || {
                *captured.lock() = EffectScope::current();
                Err(StoreError::failed("boom"))
            })
        };

        assert!(build_store("broken", &descriptor, DefinitionId::next(), &registry).is_err());
        let scope = captured.lock().expect("setup ran inside a scope");
        assert!(!scope.is_active());
    }

    #[test]
    fn panicking_setup_does_not_register() {
        let registry = Registry::new();
        let descriptor = StoreDescriptor::setup(|| panic!("setup exploded"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            build_store("panicky", &descriptor, DefinitionId::next(), &registry)
        }));
        assert!(result.is_err());
        assert!(registry.is_empty());
        assert_eq!(EffectScope::current(), None);
    }

    #[test]
    fn committed_store_has_id_and_dispose() {
        let registry = Registry::new();
        let descriptor = StoreDescriptor::from(OptionsStore::new().state(|| json!({"n": 1})));

        let store = build_store("s", &descriptor, DefinitionId::next(), &registry).unwrap();
        assert_eq!(store.get("$id"), Some(json!("s")));
        assert!(store.field("$dispose").unwrap().is_action());
        assert!(registry.get_store("s").unwrap().ptr_eq(&store));
    }

    #[test]
    fn losing_a_commit_race_returns_the_winner() {
        let registry = Registry::new();
        let definition = DefinitionId::next();
        let winner = build_store(
            "s",
            &StoreDescriptor::setup(|| Ok(SetupStore::new())),
            definition,
            &registry,
        )
        .unwrap();

        // A second build of an id that is already committed.
        let loser_scope = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let descriptor = {
            let loser_scope = loser_scope.clone();
            StoreDescriptor::setup(move || {
                *loser_scope.lock() = EffectScope::current();
                Ok(SetupStore::new().action("noop", Action::new(|_| Ok(Value::Null))))
            })
        };
        let returned = build_store("s", &descriptor, definition, &registry).unwrap();

        assert!(returned.ptr_eq(&winner));
        assert!(!loser_scope.lock().unwrap().is_active());
        assert!(winner.is_active());
    }

    #[test]
    fn stopped_registry_refuses_to_build() {
        let registry = Registry::new();
        registry.teardown();
        let descriptor = StoreDescriptor::setup(|| Ok(SetupStore::new()));
        assert!(matches!(
            build_store("late", &descriptor, DefinitionId::next(), &registry),
            Err(StoreError::RegistryStopped)
        ));
    }
}

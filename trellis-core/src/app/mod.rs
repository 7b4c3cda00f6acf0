//! Application context.
//!
//! An [`App`] is the ambient context stores are resolved through. Values are
//! published with [`App::provide`] under a typed [`InjectionKey`] and read back
//! with [`App::inject`]. The handle is cheap to clone, so it can be passed to
//! every call site that needs a store instead of living in a global.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

/// Typed key for a provided value.
pub struct InjectionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> InjectionKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for InjectionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectionKey").field(&self.name).finish()
    }
}

/// Something that can publish itself into an [`App`].
pub trait Install {
    fn install(&self, app: &App);
}

type Provided = Arc<dyn Any + Send + Sync>;

/// Application-wide provide/inject context.
#[derive(Clone, Default)]
pub struct App {
    provides: Arc<RwLock<HashMap<&'static str, Provided>>>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run an installer against this app. Chainable.
    pub fn with<I: Install + ?Sized>(&self, installer: &I) -> &Self {
        installer.install(self);
        self
    }

    /// Publish `value` under `key`, replacing any previous value.
    pub fn provide<T>(&self, key: &InjectionKey<T>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.provides.write().insert(key.name, Arc::new(value));
    }

    /// Read the value published under `key`.
    ///
    /// Returns `None` if nothing was provided or the value has another type.
    pub fn inject<T>(&self, key: &InjectionKey<T>) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        let provided = self.provides.read().get(key.name).cloned()?;
        provided.downcast_ref::<T>().cloned()
    }

    pub fn has<T>(&self, key: &InjectionKey<T>) -> bool {
        self.provides.read().contains_key(key.name)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&'static str> = self.provides.read().keys().copied().collect();
        f.debug_struct("App").field("provides", &keys).finish()
    }
}

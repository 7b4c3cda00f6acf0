//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It records which subscribers depend on which sources and
//! propagates invalidation when a source changes.
//!
//! # How It Works
//!
//! 1. Memos and effects register with the runtime when they are created.
//!
//! 2. When a memo or effect reads a source inside its tracking context, the
//!    runtime records the dependency.
//!
//! 3. When a source changes, the runtime:
//!    a. Finds all dependent memos/effects
//!    b. Marks them as "maybe dirty" (memos forward this to their own dependents)
//!    c. Re-runs effects synchronously
//!    d. Memos are lazy - they recompute on next access
//!
//! # Thread Safety
//!
//! The tracking context is thread-local; the dependency maps are global
//! concurrent maps so that handles can be shared across threads.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;

type Subscribers = SmallVec<[SubscriberId; 4]>;

/// A trait for types that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this reactive value as potentially needing update.
    fn mark_maybe_dirty(&self);

    /// Schedule this reactive value for execution (effects only).
    fn schedule(&self);

    /// Check if this reactive value is an effect (eager) or memo (lazy).
    fn is_eager(&self) -> bool;
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Weak references so the runtime never keeps a computation alive.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();
static SOURCE_SUBSCRIBERS: OnceLock<DashMap<u64, Subscribers>> = OnceLock::new();

fn get_registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn get_source_subscribers() -> &'static DashMap<u64, Subscribers> {
    SOURCE_SUBSCRIBERS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        get_registry().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        get_registry().remove(&id);
        get_source_subscribers().retain(|_, subs| {
            subs.retain(|s| *s != id);
            !subs.is_empty()
        });
    }

    /// Record that a subscriber depends on a source.
    pub fn add_dependency(source_id: u64, subscriber_id: SubscriberId) {
        let mut subs = get_source_subscribers().entry(source_id).or_default();
        if !subs.contains(&subscriber_id) {
            subs.push(subscriber_id);
        }
    }

    /// Drop a single dependency edge.
    pub fn remove_dependency(source_id: u64, subscriber_id: SubscriberId) {
        let map = get_source_subscribers();
        let now_empty = match map.get_mut(&source_id) {
            Some(mut subs) => {
                subs.retain(|s| *s != subscriber_id);
                subs.is_empty()
            }
            None => false,
        };
        if now_empty {
            map.remove_if(&source_id, |_, subs| subs.is_empty());
        }
    }

    /// Number of subscribers currently depending on a source.
    pub fn subscriber_count(source_id: u64) -> usize {
        get_source_subscribers()
            .get(&source_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Record a read of `source_id` against the running computation, if any.
    pub fn track_read(source_id: u64) {
        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(source_id);
            Self::add_dependency(source_id, subscriber_id);
        }
    }

    /// Notify all subscribers that a source changed.
    ///
    /// No map guard is held while subscribers run, so they are free to read
    /// and write other sources.
    pub fn notify_source_change(source_id: u64) {
        let subscriber_ids = match get_source_subscribers().get(&source_id) {
            Some(subs) => subs.clone(),
            None => return,
        };

        let reactives: Vec<Arc<dyn Reactive>> = subscriber_ids
            .iter()
            .filter_map(|id| get_registry().get(id).and_then(|weak| weak.upgrade()))
            .collect();

        for reactive in &reactives {
            reactive.mark_maybe_dirty();
        }

        for reactive in reactives {
            if reactive.is_eager() {
                reactive.schedule();
            }
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal or memo is read,
//! the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running a memo or effect), we push the
//! subscriber onto the stack. When the computation completes, the guard pops it.
//!
//! Store construction never enters a tracking context itself: building a store
//! inside an effect must not make the effect depend on the store's state.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::SubscriberId;

/// Dependency list for one computation. Most getters read a handful of sources.
pub type Dependencies = SmallVec<[u64; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// `None` marks an untracked region pushed by [`ReactiveContext::untracked`].
    subscriber_id: Option<SubscriberId>,
    /// Source ids read during this computation.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// The stack stays balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any source that is read will
    /// register the subscriber as a dependent.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Run `f` with tracking suspended.
    ///
    /// Reads inside `f` are not recorded against any enclosing computation.
    pub fn untracked<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = Self::push(None);
        f()
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Dependencies::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active tracking context.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a dependency on the given source.
    ///
    /// Called by signals and memos when they are read.
    pub fn track_dependency(source_id: u64) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() && !entry.dependencies.contains(&source_id) {
                    entry.dependencies.push(source_id);
                }
            }
        });
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

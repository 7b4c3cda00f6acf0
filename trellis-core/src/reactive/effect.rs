//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime re-runs the effect
//!    synchronously.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Ownership
//!
//! An effect created while an [`EffectScope`](super::EffectScope) is running
//! is disposed when that scope stops. Stores use this to tie `subscribe`
//! callbacks to the store's lifetime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{Dependencies, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::scope::on_scope_dispose;
use super::subscriber::SubscriberId;

struct EffectInner {
    subscriber_id: SubscriberId,

    run: Arc<dyn Fn() + Send + Sync>,

    /// Sources read during the last run.
    dependencies: Mutex<Dependencies>,

    disposed: AtomicBool,

    /// Set while the function runs; a write to one of its own dependencies
    /// must not re-enter it.
    running: AtomicBool,

    run_count: AtomicUsize,
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It does not react to anything until its first `execute`.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            run: Arc::new(run),
            dependencies: Mutex::new(Dependencies::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        let handle = Runtime::register(inner.clone());
        let effect = Self {
            inner,
            _handle: Arc::new(handle),
        };

        // A running scope owns the effect until it stops.
        let owned = effect.clone();
        on_scope_dispose(move || owned.dispose());

        effect
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Execute the effect function, re-recording its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Schedule the effect to re-run.
    pub fn schedule(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

/// Ends a run, also when the effect function unwinds: keeps whatever was
/// read so far as the new dependencies and clears `running`. Dropped before
/// the tracking context it reads from.
struct RunGuard<'a> {
    effect: &'a EffectInner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.effect.dependencies.lock() = ReactiveContext::get_dependencies();
        self.effect.run_count.fetch_add(1, Ordering::SeqCst);
        self.effect.running.store(false, Ordering::SeqCst);
    }
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let old_deps = std::mem::take(&mut *self.dependencies.lock());
        for source in old_deps {
            Runtime::remove_dependency(source, self.subscriber_id);
        }

        let _ctx = ReactiveContext::enter(self.subscriber_id);
        let _run = RunGuard { effect: self };
        (self.run)();
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let deps = std::mem::take(&mut *self.dependencies.lock());
        for source in deps {
            Runtime::remove_dependency(source, self.subscriber_id);
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {}

    fn schedule(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

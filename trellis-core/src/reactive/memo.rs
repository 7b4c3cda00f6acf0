//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the runtime marks the memo "maybe dirty" and
//!    the memo forwards the notification to its own dependents.
//!
//! 4. On next access, the memo recomputes, re-recording its dependencies.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! # Ownership
//!
//! A memo created while an [`EffectScope`](super::EffectScope) is running is
//! disposed when that scope stops. A disposed memo keeps returning its last
//! value and no longer tracks anything.
//!
//! No lock is held while the computation runs, so a computation may freely
//! read other memos and signals.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::context::{Dependencies, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::scope::on_scope_dispose;
use super::subscriber::{next_source_id, SubscriberId};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency might have changed. Need to check.
    MaybeDirty,

    /// The memo definitely needs to recompute.
    Dirty,
}

struct MemoInner<T> {
    /// Source id other computations depend on.
    id: u64,

    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    compute: Arc<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    state: Mutex<MemoState>,

    /// Sources read during the last computation.
    dependencies: Mutex<Dependencies>,

    disposed: AtomicBool,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// The PartialEq bound lets the memo detect whether a recomputation actually
/// produced a new value.
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MemoInner<T>>,
    _handle: Arc<ReactiveHandle>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            id: next_source_id(),
            subscriber_id: SubscriberId::new(),
            compute: Arc::new(compute),
            value: RwLock::new(None),
            state: Mutex::new(MemoState::Dirty),
            dependencies: Mutex::new(Dependencies::new()),
            disposed: AtomicBool::new(false),
        });
        let handle = Runtime::register(inner.clone());

        let weak: Weak<MemoInner<T>> = Arc::downgrade(&inner);
        on_scope_dispose(move || {
            if let Some(inner) = weak.upgrade() {
                inner.dispose();
            }
        });

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the memo's source ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        Runtime::track_read(self.inner.id);
        self.inner.read()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        ReactiveContext::untracked(|| self.inner.read())
    }

    /// Mark the memo as potentially needing recomputation.
    pub fn mark_maybe_dirty(&self) {
        self.inner.invalidate();
    }

    /// Mark the memo as definitely needing recomputation.
    pub fn mark_dirty(&self) {
        *self.inner.state.lock() = MemoState::Dirty;
    }

    /// Stop tracking. The memo keeps its last value.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of computations depending on this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }

    /// Whether two handles refer to the same memo.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn read(&self) -> T {
        let state = *self.state.lock();
        if state == MemoState::Clean || self.disposed.load(Ordering::SeqCst) {
            if let Some(value) = self.value.read().clone() {
                return value;
            }
        }
        self.recompute()
    }

    /// Recompute the memo's value inside its own tracking context.
    fn recompute(&self) -> T {
        let disposed = self.disposed.load(Ordering::SeqCst);

        // Stale edges go first; the computation re-adds what it still reads.
        let old_deps = std::mem::take(&mut *self.dependencies.lock());
        for source in old_deps {
            Runtime::remove_dependency(source, self.subscriber_id);
        }

        let new_value = if disposed {
            ReactiveContext::untracked(|| (self.compute)())
        } else {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            let value = (self.compute)();
            *self.dependencies.lock() = ReactiveContext::get_dependencies();
            value
        };

        let value_changed = self.value.read().as_ref() != Some(&new_value);
        *self.value.write() = Some(new_value.clone());
        *self.state.lock() = MemoState::Clean;

        tracing::trace!(memo = self.id, changed = value_changed, "memo recomputed");

        new_value
    }

    fn invalidate(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let was_clean = {
            let mut state = self.state.lock();
            let was_clean = *state == MemoState::Clean;
            if was_clean {
                *state = MemoState::MaybeDirty;
            }
            was_clean
        };
        // Forward once per invalidation so chains of memos settle.
        if was_clean {
            Runtime::notify_source_change(self.id);
        }
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

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {
        self.invalidate();
    }

    fn schedule(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    use crate::reactive::{EffectScope, Signal};

    #[test]
    fn memo_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        // First access triggers computation
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memo_recomputes_when_signal_changes() {
        let signal = Signal::new(2);
        let call_count = Arc::new(AtomicI32::new(0));

        let memo = {
            let signal = signal.clone();
            let call_count = call_count.clone();
            Memo::new(move || {
                call_count.fetch_add(1, Ordering::SeqCst);
                signal.get() * 10
            })
        };

        assert_eq!(memo.get(), 20);
        assert_eq!(memo.state(), MemoState::Clean);

        signal.set(3);
        assert_eq!(memo.state(), MemoState::MaybeDirty);
        assert_eq!(memo.get(), 30);
        assert_eq!(memo.get(), 30);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn memo_chain_invalidates_downstream() {
        let base = Signal::new(5);
        let doubled = {
            let base = base.clone();
            Memo::new(move || base.get() * 2)
        };
        let plus_ten = {
            let doubled = doubled.clone();
            Memo::new(move || doubled.get() + 10)
        };

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(plus_ten.state(), MemoState::MaybeDirty);
        assert_eq!(plus_ten.get(), 30);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn memo_state_transitions() {
        let memo = Memo::new(|| 42);

        assert_eq!(memo.state(), MemoState::Dirty);

        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);

        memo.mark_maybe_dirty();
        assert_eq!(memo.state(), MemoState::MaybeDirty);

        memo.mark_dirty();
        assert_eq!(memo.state(), MemoState::Dirty);

        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert!(memo1.ptr_eq(&memo2));

        memo1.mark_dirty();
        assert_eq!(memo2.state(), MemoState::Dirty);
    }

    #[test]
    fn stopping_owner_scope_freezes_memo() {
        let signal = Signal::new(1);
        let scope = EffectScope::detached();
        let memo = scope
            .run(|| {
                let signal = signal.clone();
                Memo::new(move || signal.get() + 1)
            })
            .unwrap();

        assert_eq!(memo.get(), 2);
        assert_eq!(signal.subscriber_count(), 1);

        scope.stop();
        assert!(memo.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(10);
        assert_eq!(memo.get(), 2);
    }
}

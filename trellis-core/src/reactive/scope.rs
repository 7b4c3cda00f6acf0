//! Effect Scopes
//!
//! An effect scope owns the reactive computations created while it runs.
//! Stopping a scope disposes every memo and effect it captured and then
//! stops its child scopes, so a whole subtree of subscriptions can be released
//! in one call without manual bookkeeping.
//!
//! # Implementation
//!
//! Scopes live in a global arena indexed by [`ScopeId`]. Each node stores its
//! parent, its children and the cleanups registered against it. An
//! [`EffectScope`] is only a copyable handle to an arena slot; a scope is
//! active exactly as long as its node is present in the arena.
//!
//! The "currently running" scope is tracked with a thread-local stack, in the
//! same way [`ReactiveContext`](super::ReactiveContext) tracks the running
//! computation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;

/// Unique identifier for a scope in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

struct ScopeNode {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    cleanups: Vec<Cleanup>,
}

static SCOPES: OnceLock<Mutex<HashMap<ScopeId, ScopeNode>>> = OnceLock::new();

fn arena() -> &'static Mutex<HashMap<ScopeId, ScopeNode>> {
    SCOPES.get_or_init(|| Mutex::new(HashMap::new()))
}

thread_local! {
    static RUNNING: RefCell<Vec<ScopeId>> = const { RefCell::new(Vec::new()) };
}

/// Pops the running-scope stack when dropped, including on unwind.
struct RunGuard;

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUNNING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Handle to a node in the scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectScope {
    id: ScopeId,
}

impl EffectScope {
    /// Create a scope with no parent.
    pub fn detached() -> Self {
        Self::insert(None)
    }

    /// Create a scope owned by the currently running scope, or a detached one
    /// when no scope is running.
    pub fn new() -> Self {
        match Self::current() {
            Some(parent) => parent.child().unwrap_or_else(Self::detached),
            None => Self::detached(),
        }
    }

    /// Create a child of this scope. Returns `None` if this scope is stopped.
    pub fn child(&self) -> Option<Self> {
        let id = ScopeId::next();
        let mut scopes = arena().lock();
        let parent = scopes.get_mut(&self.id)?;
        parent.children.push(id);
        scopes.insert(
            id,
            ScopeNode {
                parent: Some(self.id),
                children: Vec::new(),
                cleanups: Vec::new(),
            },
        );
        Some(Self { id })
    }

    fn insert(parent: Option<ScopeId>) -> Self {
        let id = ScopeId::next();
        arena().lock().insert(
            id,
            ScopeNode {
                parent,
                children: Vec::new(),
                cleanups: Vec::new(),
            },
        );
        Self { id }
    }

    /// The innermost scope currently running on this thread.
    pub fn current() -> Option<Self> {
        RUNNING.with(|stack| stack.borrow().last().map(|&id| Self { id }))
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        arena().lock().contains_key(&self.id)
    }

    /// Run `f` with this scope as the current scope.
    ///
    /// Returns `None` without calling `f` if the scope has been stopped.
    pub fn run<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        if !self.is_active() {
            tracing::warn!(scope = self.id.0, "cannot run an inactive effect scope");
            return None;
        }

        RUNNING.with(|stack| stack.borrow_mut().push(self.id));
        let _guard = RunGuard;
        Some(f())
    }

    /// Register a cleanup to run when this scope stops.
    ///
    /// Returns `false` (dropping `cleanup` unrun) if the scope is already stopped.
    pub fn on_stop<F>(&self, cleanup: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match arena().lock().get_mut(&self.id) {
            Some(node) => {
                node.cleanups.push(Box::new(cleanup));
                true
            }
            None => false,
        }
    }

    /// Stop this scope and every scope below it.
    ///
    /// Cleanups run after the arena lock is released, children before parents,
    /// each node's cleanups in registration order. Stopping a stopped scope is
    /// a no-op.
    pub fn stop(&self) {
        let cleanups = {
            let mut scopes = arena().lock();
            let Some(root) = scopes.remove(&self.id) else {
                return;
            };

            if let Some(parent) = root.parent.and_then(|p| scopes.get_mut(&p)) {
                parent.children.retain(|c| *c != self.id);
            }

            let mut cleanups = Vec::new();
            collect_subtree(&mut scopes, root, &mut cleanups);
            cleanups
        };

        tracing::trace!(scope = self.id.0, cleanups = cleanups.len(), "effect scope stopped");

        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_subtree(
    scopes: &mut HashMap<ScopeId, ScopeNode>,
    node: ScopeNode,
    out: &mut Vec<Cleanup>,
) {
    for child in node.children {
        if let Some(child_node) = scopes.remove(&child) {
            collect_subtree(scopes, child_node, out);
        }
    }
    out.extend(node.cleanups);
}

/// Register a cleanup with the scope currently running on this thread.
///
/// Returns `false` when no scope is running.
pub fn on_scope_dispose<F>(cleanup: F) -> bool
where
    F: FnOnce() + Send + 'static,
{
    match EffectScope::current() {
        Some(scope) => scope.on_stop(cleanup),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn run_sets_current_scope() {
        let scope = EffectScope::detached();
        assert_eq!(EffectScope::current(), None);

        let inside = scope.run(EffectScope::current);
        assert_eq!(inside, Some(Some(scope)));
        assert_eq!(EffectScope::current(), None);
    }

    #[test]
    fn new_inside_run_attaches_to_running_scope() {
        let parent = EffectScope::detached();
        let child = parent.run(EffectScope::new).unwrap();

        parent.stop();
        assert!(!child.is_active());
    }

    #[test]
    fn stop_runs_cleanups_children_first() {
        let order = Arc::new(StdMutex::new(Vec::new()));
        let root = EffectScope::detached();
        let child = root.child().unwrap();

        let o = order.clone();
        root.on_stop(move || o.lock().unwrap().push("root"));
        let o = order.clone();
        child.on_stop(move || o.lock().unwrap().push("child"));

        root.stop();
        assert_eq!(*order.lock().unwrap(), vec!["child", "root"]);
    }

    #[test]
    fn stopping_a_child_leaves_siblings_alone() {
        let root = EffectScope::detached();
        let a = root.child().unwrap();
        let b = root.child().unwrap();

        a.stop();
        assert!(!a.is_active());
        assert!(b.is_active());
        assert!(root.is_active());

        root.stop();
        assert!(!b.is_active());
    }

    #[test]
    fn stop_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let scope = EffectScope::detached();
        let c = count.clone();
        scope.on_stop(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        scope.stop();
        scope.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stopped_scope_refuses_work() {
        let scope = EffectScope::detached();
        scope.stop();

        assert_eq!(scope.run(|| 1), None);
        assert!(scope.child().is_none());
        assert!(!scope.on_stop(|| {}));
    }

    #[test]
    fn on_scope_dispose_needs_a_running_scope() {
        assert!(!on_scope_dispose(|| {}));

        let hit = Arc::new(AtomicUsize::new(0));
        let scope = EffectScope::detached();
        let h = hit.clone();
        let registered = scope
            .run(|| {
                on_scope_dispose(move || {
                    h.fetch_add(1, Ordering::SeqCst);
                })
            })
            .unwrap();
        assert!(registered);

        scope.stop();
        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }
}

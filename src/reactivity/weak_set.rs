// ============================================================================
// spark-bindables - Weak Binding Set
// Non-owning registry of bound peers
// ============================================================================
//
// A peer set never extends a node's lifetime. Liveness is probed with
// `Weak::upgrade`; dead entries are invisible to `contains`/iteration and
// are purged whenever the set is enumerated.
//
// The mutex serializes structural edits (add/remove/clear/purge) against each
// other. It is released before any callback runs: fan-out callbacks routinely
// add or remove peers on the very set being iterated.
// ============================================================================

use std::fmt;
use std::rc::{Rc, Weak};

use parking_lot::Mutex;
use tracing::trace;

/// Unordered set of weak references to nodes of type `N`.
pub struct WeakBindingSet<N> {
    entries: Mutex<Vec<Weak<N>>>,
}

impl<N> WeakBindingSet<N> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Add `node`. Returns false if it was already present.
    pub fn add(&self, node: &Rc<N>) -> bool {
        let mut entries = self.entries.lock();
        if entries.iter().any(|w| points_to(w, node)) {
            return false;
        }
        entries.push(Rc::downgrade(node));
        true
    }

    /// Remove `node`. Returns true if it was present.
    pub fn remove(&self, node: &Rc<N>) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|w| !points_to(w, node));
        entries.len() != before
    }

    pub fn contains(&self, node: &Rc<N>) -> bool {
        self.entries.lock().iter().any(|w| points_to(w, node))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purge dead entries and return strong handles to the survivors.
    ///
    /// The lock is released before this returns, so callers may freely
    /// mutate the set while walking the snapshot.
    pub fn live(&self) -> Vec<Rc<N>> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|w| w.strong_count() > 0);
        let purged = before - entries.len();
        if purged > 0 {
            trace!(purged, "purged dead peer references");
        }
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Call `f` for each live entry.
    pub fn for_each_live(&self, mut f: impl FnMut(&Rc<N>)) {
        for node in self.live() {
            f(&node);
        }
    }

    /// Call `f` for each live entry, stopping at the first error.
    pub fn try_for_each_live<E>(
        &self,
        mut f: impl FnMut(&Rc<N>) -> Result<(), E>,
    ) -> Result<(), E> {
        for node in self.live() {
            f(&node)?;
        }
        Ok(())
    }
}

/// True if `weak` refers to the live allocation behind `node`.
fn points_to<N>(weak: &Weak<N>, node: &Rc<N>) -> bool {
    weak.strong_count() > 0 && std::ptr::eq(weak.as_ptr(), Rc::as_ptr(node))
}

impl<N> Default for WeakBindingSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for WeakBindingSet<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBindingSet")
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let set = WeakBindingSet::new();
        let a = Rc::new(1);

        assert!(set.add(&a));
        assert!(!set.add(&a));
        assert_eq!(set.len(), 1);
        assert!(set.contains(&a));
    }

    #[test]
    fn identity_not_equality() {
        let set = WeakBindingSet::new();
        let a = Rc::new(5);
        let b = Rc::new(5);

        set.add(&a);
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
        assert!(!set.remove(&b));
        assert!(set.remove(&a));
        assert!(set.is_empty());
    }

    #[test]
    fn dead_entries_are_invisible_and_purged() {
        let set = WeakBindingSet::new();
        let a = Rc::new("a");
        let b = Rc::new("b");
        set.add(&a);
        set.add(&b);

        drop(b);

        assert_eq!(set.len(), 1);
        let live = set.live();
        assert_eq!(live.len(), 1);
        assert_eq!(*live[0], "a");
        assert_eq!(set.entries.lock().len(), 1);
    }

    #[test]
    fn set_does_not_extend_lifetime() {
        let set = WeakBindingSet::new();
        let a = Rc::new(String::from("peer"));
        set.add(&a);
        assert_eq!(Rc::strong_count(&a), 1);
    }

    #[test]
    fn callback_may_edit_the_set() {
        let set = Rc::new(WeakBindingSet::new());
        let a = Rc::new(1);
        let b = Rc::new(2);
        set.add(&a);
        set.add(&b);

        let mut visited = 0;
        set.for_each_live(|node| {
            visited += 1;
            set.remove(node);
        });

        assert_eq!(visited, 2);
        assert!(set.is_empty());
    }

    #[test]
    fn try_for_each_stops_on_error() {
        let set = WeakBindingSet::new();
        let nodes: Vec<_> = (0..4).map(Rc::new).collect();
        for n in &nodes {
            set.add(n);
        }

        let mut seen = Vec::new();
        let result = set.try_for_each_live(|n| {
            seen.push(**n);
            if **n == 1 { Err("stop") } else { Ok(()) }
        });

        assert_eq!(result, Err("stop"));
        assert_eq!(seen, vec![0, 1]);
    }
}

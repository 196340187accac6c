// ============================================================================
// spark-bindables - Settlement
// Fan a write out to peers, then decide whether this node fires
// ============================================================================
//
// Every settled field (value, disabled, min, max, precision, list disabled)
// follows the same four steps:
//
// 1. Remember the value this node was just asked to settle to.
// 2. Push the field's current value to every live peer except the one the
//    write came from, reading it again for each peer.
// 3. After the whole fan-out returns, read the field again.
// 4. Fire the change event only if it still equals what was remembered.
//
// A listener that reentrantly overwrites the field during step 2 starts its
// own settlement, which fires with the final value. The remaining peers of the
// outer fan-out are then handed that final value, never the superseded one.
// The outer settlement sees a different value in step 3 and stays silent, so
// each external write yields at most one event per node, always carrying the
// converged value.
// ============================================================================

use std::rc::Rc;

use tracing::trace;

use crate::core::error::Result;
use crate::reactivity::weak_set::WeakBindingSet;

/// One pending settlement of a field holding `V` on a node of type `N`.
pub(crate) struct Settlement<'a, N, V> {
    peers: &'a WeakBindingSet<N>,
    source: Option<&'a Rc<N>>,
    settling_to: V,
    propagate: bool,
}

impl<'a, N, V> Settlement<'a, N, V> {
    pub(crate) fn new(peers: &'a WeakBindingSet<N>, source: Option<&'a Rc<N>>, settling_to: V) -> Self {
        Self {
            peers,
            source,
            settling_to,
            propagate: true,
        }
    }

    /// Skip the fan-out and only notify (manual trigger).
    pub(crate) fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    /// Fan `current()` out with `push`, then call `notify` with the settled
    /// value if `same` says nothing overtook it.
    pub(crate) fn run(
        self,
        mut push: impl FnMut(&Rc<N>, &V) -> Result<()>,
        current: impl Fn() -> V,
        same: impl Fn(&V, &V) -> bool,
        notify: impl FnOnce(V),
    ) -> Result<()> {
        let Settlement {
            peers,
            source,
            settling_to,
            propagate,
        } = self;

        if propagate {
            peers.try_for_each_live(|peer| {
                if source.is_some_and(|s| Rc::ptr_eq(s, peer)) {
                    return Ok(());
                }
                push(peer, &current())
            })?;
        }

        let settled = current();
        if same(&settled, &settling_to) {
            notify(settled);
        } else {
            trace!("settlement superseded by a reentrant write");
        }
        Ok(())
    }
}

// ============================================================================
// spark-bindables - Leasing
// Exclusive write access over a whole connected binding graph
// ============================================================================
//
// `begin_lease` creates a lease handle, binds it to the origin and disables
// the whole graph through it. Until the handle is returned:
//
// - no node in the graph can change `disabled` except through the handle
// - the origin rejects direct value writes
// - no second lease can begin anywhere in the graph
//
// Writes made through a handle (or a bound copy of one) ignore disabled flags
// and lease checks all the way along the fan-out.
// ============================================================================

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::core::error::{BindableError, Result};
use crate::primitives::bindable::{Bindable, Node};

// =============================================================================
// LEASE STATE
// =============================================================================

/// Carried by a lease-shaped node.
pub(crate) struct LeaseState<T> {
    /// The node that granted the lease. `None` for copies of a handle, which
    /// can write through the graph but never return the lease.
    origin: Option<Weak<Node<T>>>,
    /// Snapshot restored on return. `Some` only when reverting.
    value_before: Option<T>,
    disabled_before: bool,
    returned: Cell<bool>,
}

impl<T: Clone> LeaseState<T> {
    fn granted_by(origin: &Rc<Node<T>>, revert_value_on_return: bool) -> Self {
        Self {
            origin: Some(Rc::downgrade(origin)),
            value_before: revert_value_on_return.then(|| origin.value.borrow().clone()),
            disabled_before: origin.disabled.get(),
            returned: Cell::new(false),
        }
    }

    pub(crate) fn detached() -> Self {
        Self {
            origin: None,
            value_before: None,
            disabled_before: false,
            returned: Cell::new(false),
        }
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.returned.get() {
            return Err(BindableError::LeaseExpired);
        }
        Ok(())
    }
}

// =============================================================================
// NODE - lease bookkeeping
// =============================================================================

impl<T: Clone + PartialEq + 'static> Node<T> {
    /// True if this node or anything reachable from it has granted a lease.
    pub(crate) fn lease_active_in_graph(self: &Rc<Self>) -> bool {
        let mut visited: HashSet<*const Node<T>> = HashSet::new();
        let mut stack = vec![self.clone()];

        while let Some(node) = stack.pop() {
            if !visited.insert(Rc::as_ptr(&node)) {
                continue;
            }
            if node.active_lease.borrow().is_some() {
                return true;
            }
            stack.extend(
                node.peers
                    .live()
                    .into_iter()
                    .filter(|peer| !visited.contains(&Rc::as_ptr(peer))),
            );
        }
        false
    }

    fn begin_lease(self: &Rc<Self>, revert_value_on_return: bool) -> Result<Rc<Node<T>>> {
        if self.lease_active_in_graph() {
            return Err(BindableError::AlreadyLeased);
        }

        let constraint = self.constraint.as_ref().map(|c| c.duplicate());
        let state = LeaseState::granted_by(self, revert_value_on_return);
        let handle = Bindable::from_node(self.copy_with(constraint, Some(state)));

        handle.bind_to(&Bindable::from_node(self.clone()))?;
        handle.set_disabled(true)?;

        *self.active_lease.borrow_mut() = Some(handle.inner.clone());
        debug!(revert_value_on_return, "lease granted");
        Ok(handle.inner)
    }

    /// Give a lease back: restore the snapshots through the handle, then clear
    /// the origin's slot. A no-op for nodes that are not an unreturned handle.
    pub(crate) fn release_lease(self: &Rc<Self>) -> Result<()> {
        let Some(lease) = &self.lease else {
            return Ok(());
        };
        if lease.returned.get() {
            return Ok(());
        }
        let Some(origin) = &lease.origin else {
            return Ok(());
        };

        if let Some(origin) = origin.upgrade() {
            if let Some(value) = &lease.value_before {
                self.write_value(value.clone())?;
            }
            self.write_disabled(lease.disabled_before)?;
            origin.end_lease(self)?;
        }

        lease.returned.set(true);
        debug!("lease returned");
        Ok(())
    }

    /// Clear this node's lease slot, which must hold `handle`.
    pub(crate) fn end_lease(&self, handle: &Rc<Node<T>>) -> Result<()> {
        let mut slot = self.active_lease.borrow_mut();
        let matches = match slot.as_ref() {
            None => return Err(BindableError::InvalidLeaseState("no lease is active")),
            Some(active) => Rc::ptr_eq(active, handle),
        };
        if !matches {
            return Err(BindableError::InvalidLeaseState(
                "the lease was granted to a different handle",
            ));
        }
        *slot = None;
        Ok(())
    }
}

// =============================================================================
// BINDABLE - lease entry points
// =============================================================================

impl<T: Clone + PartialEq + 'static> Bindable<T> {
    /// Lease this bindable, taking exclusive write access over its whole
    /// connected graph.
    ///
    /// The graph is disabled until the lease is returned. Fails with
    /// `AlreadyLeased` if any node in the graph already granted a lease.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_bindables::{Bindable, BindableError};
    ///
    /// let master = Bindable::new(1);
    /// let lease = master.begin_lease(true).unwrap();
    ///
    /// assert!(master.disabled());
    /// assert_eq!(master.set_value(5), Err(BindableError::MutationOnLeased));
    ///
    /// lease.set_value(5).unwrap();
    /// assert_eq!(master.value(), 5);
    ///
    /// lease.return_bindable().unwrap();
    /// assert_eq!(master.value(), 1);
    /// assert!(!master.disabled());
    /// ```
    pub fn begin_lease(&self, revert_value_on_return: bool) -> Result<LeasedBindable<T>> {
        let handle = self.inner.begin_lease(revert_value_on_return)?;
        Ok(LeasedBindable {
            bindable: Bindable::from_node(handle),
        })
    }

    /// True while this node has an outstanding lease.
    pub fn is_leased(&self) -> bool {
        self.inner.active_lease.borrow().is_some()
    }
}

// =============================================================================
// LEASED BINDABLE
// =============================================================================

/// A lease handle. Derefs to [`Bindable`] for reads and writes.
pub struct LeasedBindable<T> {
    bindable: Bindable<T>,
}

impl<T: Clone + PartialEq + 'static> LeasedBindable<T> {
    fn state(&self) -> Result<&LeaseState<T>> {
        self.bindable
            .inner
            .lease
            .as_ref()
            .ok_or(BindableError::InvalidLeaseState("not a lease handle"))
    }

    /// Return the lease: restore the snapshots, clear the origin's lease and
    /// detach this handle from everything.
    ///
    /// Fails with `InvalidLeaseState` when already returned, or when this is a
    /// copy of the handle rather than the handle itself.
    pub fn return_bindable(&self) -> Result<()> {
        let state = self.state()?;
        if state.origin.is_none() {
            return Err(BindableError::InvalidLeaseState(
                "only the handle returned by begin_lease can return the lease",
            ));
        }
        if state.returned.get() {
            return Err(BindableError::InvalidLeaseState(
                "the lease was already returned",
            ));
        }
        self.bindable.unbind_all()
    }

    pub fn is_returned(&self) -> bool {
        self.state().is_ok_and(|s| s.returned.get())
    }

    pub fn revert_value_on_return(&self) -> bool {
        self.state().is_ok_and(|s| s.value_before.is_some())
    }

    /// A lease-shaped copy bound to this handle. It may write through the
    /// leased graph but cannot return the lease.
    pub fn get_bound_copy(&self) -> LeasedBindable<T> {
        LeasedBindable {
            bindable: self.bindable.get_bound_copy(),
        }
    }

    pub fn get_unbound_copy(&self) -> LeasedBindable<T> {
        LeasedBindable {
            bindable: self.bindable.get_unbound_copy(),
        }
    }

    pub fn as_bindable(&self) -> &Bindable<T> {
        &self.bindable
    }
}

impl<T> Deref for LeasedBindable<T> {
    type Target = Bindable<T>;

    fn deref(&self) -> &Self::Target {
        &self.bindable
    }
}

impl<T> Clone for LeasedBindable<T> {
    fn clone(&self) -> Self {
        Self {
            bindable: self.bindable.clone(),
        }
    }
}

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for LeasedBindable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedBindable")
            .field("value", &self.bindable.value())
            .field("returned", &self.is_returned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_lease_without_lease_fails() {
        let original = Bindable::new(1);
        assert!(matches!(
            original.inner.end_lease(&original.inner),
            Err(BindableError::InvalidLeaseState(_))
        ));
    }

    #[test]
    fn end_lease_with_wrong_handle_fails() {
        let original = Bindable::new(1);
        let lease = original.begin_lease(false).unwrap();

        assert!(matches!(
            original.inner.end_lease(&original.inner),
            Err(BindableError::InvalidLeaseState(_))
        ));
        assert!(original.is_leased());
        lease.return_bindable().unwrap();
        assert!(!original.is_leased());
    }

    #[test]
    fn graph_walk_sees_distant_lease() {
        let a = Bindable::new(0);
        let b = a.get_bound_copy();
        let c = b.get_bound_copy();
        assert!(!a.inner.lease_active_in_graph());

        let lease = c.begin_lease(false).unwrap();
        assert!(a.inner.lease_active_in_graph());
        lease.return_bindable().unwrap();
        assert!(!a.inner.lease_active_in_graph());
    }

    #[test]
    fn graph_walk_terminates_on_cycles() {
        let a = Bindable::new(0);
        let b = a.get_bound_copy();
        let c = b.get_bound_copy();
        c.bind_to(&a).unwrap();

        assert!(!b.inner.lease_active_in_graph());
    }

    #[test]
    fn handle_snapshots() {
        let original = Bindable::new(3);
        let lease = original.begin_lease(true).unwrap();
        assert!(lease.revert_value_on_return());
        assert!(!lease.is_returned());

        let copy = lease.get_bound_copy();
        assert!(!copy.revert_value_on_return());
        assert!(copy.inner.lease.is_some());
    }
}

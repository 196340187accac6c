// ============================================================================
// spark-bindables - Bindable
// A value holder kept in sync with every node it is bound to
// ============================================================================
//
// Binding is symmetric and non-owning: each node keeps weak references to its
// peers. A write fans out depth-first over the peer graph, and each node
// settles (decides whether to fire its own change event) only after the
// fan-out below it has returned. See `reactivity::settle`.
//
// Propagated writes are forced through: a peer's own disabled flag does not
// block them, only direct calls check it. A propagated write equal to the
// peer's current value stops there, which is what makes cyclic graphs
// terminate.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::error::{BindableError, Result};
use crate::core::event::{Event, Subscription, ValueChangedEvent};
use crate::core::types::{
    BindableOptions, EqualsFn, ParseFn, default_equals, from_str_parser, parse_flag,
};
use crate::primitives::lease::LeaseState;
use crate::reactivity::settle::Settlement;
use crate::reactivity::weak_set::WeakBindingSet;

// =============================================================================
// CONSTRAINT
// =============================================================================

/// Policy attached to a node that shapes values written through its public
/// setter. Numeric bindables install one; propagated writes bypass it.
pub(crate) trait Constraint<T>: Any {
    fn constrain(&self, value: T) -> T;

    /// A constraint with the same settings and no listeners.
    fn duplicate(&self) -> Rc<dyn Constraint<T>>;

    /// Narrow this constraint (owned by `node`) so it overlaps `other`.
    /// Fails without changing anything when there is no overlap.
    fn merge_from(&self, node: &Rc<Node<T>>, other: &dyn Constraint<T>) -> Result<()>;

    /// Fire this constraint's events with current state, without propagating.
    fn trigger_change(&self);

    fn clear_listeners(&self);

    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// NODE
// =============================================================================

/// The shared state behind a [`Bindable`] handle.
pub(crate) struct Node<T> {
    pub(crate) value: RefCell<T>,
    pub(crate) disabled: Cell<bool>,
    pub(crate) default: RefCell<Option<T>>,
    pub(crate) value_changed: Event<ValueChangedEvent<T>>,
    pub(crate) disabled_changed: Event<bool>,
    pub(crate) peers: WeakBindingSet<Node<T>>,
    pub(crate) equals: EqualsFn<T>,
    pub(crate) parser: Option<ParseFn<T>>,
    pub(crate) constraint: Option<Rc<dyn Constraint<T>>>,
    /// Set when this node is a lease handle, or a copy of one.
    pub(crate) lease: Option<LeaseState<T>>,
    /// The lease this node has granted, if any.
    pub(crate) active_lease: RefCell<Option<Rc<Node<T>>>>,
}

impl<T: Clone + PartialEq + 'static> Node<T> {
    pub(crate) fn new(
        value: T,
        options: BindableOptions<T>,
        constraint: Option<Rc<dyn Constraint<T>>>,
        lease: Option<LeaseState<T>>,
    ) -> Rc<Self> {
        let value = match &constraint {
            Some(c) => c.constrain(value),
            None => value,
        };
        Rc::new(Self {
            value: RefCell::new(value),
            disabled: Cell::new(options.disabled),
            default: RefCell::new(options.default),
            value_changed: Event::new(),
            disabled_changed: Event::new(),
            peers: WeakBindingSet::new(),
            equals: options.equals.unwrap_or(default_equals::<T>),
            parser: options.parser,
            constraint,
            lease,
            active_lease: RefCell::new(None),
        })
    }

    /// A fresh node with the same shape and state as `self`, but no peers and
    /// no listeners.
    pub(crate) fn copy(&self, constraint: Option<Rc<dyn Constraint<T>>>) -> Rc<Self> {
        let lease = self.lease.as_ref().map(|_| LeaseState::detached());
        self.copy_with(constraint, lease)
    }

    pub(crate) fn copy_with(
        &self,
        constraint: Option<Rc<dyn Constraint<T>>>,
        lease: Option<LeaseState<T>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(self.value.borrow().clone()),
            disabled: Cell::new(self.disabled.get()),
            default: RefCell::new(self.default.borrow().clone()),
            value_changed: Event::new(),
            disabled_changed: Event::new(),
            peers: WeakBindingSet::new(),
            equals: self.equals,
            parser: self.parser,
            constraint,
            lease,
            active_lease: RefCell::new(None),
        })
    }

    pub(crate) fn current(&self) -> T {
        self.value.borrow().clone()
    }

    fn holds_value(&self, value: &T) -> bool {
        (self.equals)(&self.value.borrow(), value)
    }

    // =========================================================================
    // VALUE
    // =========================================================================

    /// A direct write (from a handle, not from a peer).
    pub(crate) fn write_value(self: &Rc<Self>, value: T) -> Result<()> {
        match &self.lease {
            Some(lease) => lease.ensure_live()?,
            None => {
                if self.active_lease.borrow().is_some() {
                    return Err(BindableError::MutationOnLeased);
                }
                if self.disabled.get() {
                    return Err(BindableError::MutationOnDisabled);
                }
            }
        }

        if self.holds_value(&value) {
            return Ok(());
        }
        self.assign_value(value, None)
    }

    fn assign_value(self: &Rc<Self>, value: T, source: Option<&Rc<Self>>) -> Result<()> {
        let previous = self.value.replace(value);
        self.settle_value(previous, source, true)
    }

    fn receive_value(self: &Rc<Self>, value: &T, source: &Rc<Self>) -> Result<()> {
        if self.holds_value(value) {
            return Ok(());
        }
        self.assign_value(value.clone(), Some(source))
    }

    fn settle_value(
        self: &Rc<Self>,
        previous: T,
        source: Option<&Rc<Self>>,
        propagate: bool,
    ) -> Result<()> {
        Settlement::new(&self.peers, source, self.current())
            .propagate(propagate)
            .run(
                |peer, value| peer.receive_value(value, self),
                || self.current(),
                self.equals,
                |settled| {
                    self.value_changed
                        .emit(&ValueChangedEvent::new(previous, settled))
                },
            )
    }

    // =========================================================================
    // DISABLED
    // =========================================================================

    /// A direct write of the disabled flag.
    pub(crate) fn write_disabled(self: &Rc<Self>, disabled: bool) -> Result<()> {
        let bypass = match &self.lease {
            Some(lease) => {
                lease.ensure_live()?;
                true
            }
            None => {
                if self.lease_active_in_graph() {
                    return Err(BindableError::MutationOnLeased);
                }
                false
            }
        };

        if self.disabled.get() == disabled {
            return Ok(());
        }
        self.assign_disabled(disabled, bypass, None)
    }

    fn assign_disabled(
        self: &Rc<Self>,
        disabled: bool,
        bypass: bool,
        source: Option<&Rc<Self>>,
    ) -> Result<()> {
        self.disabled.set(disabled);
        self.settle_disabled(bypass, source, true)
    }

    fn receive_disabled(self: &Rc<Self>, disabled: bool, bypass: bool, source: &Rc<Self>) -> Result<()> {
        if !bypass && self.active_lease.borrow().is_some() {
            return Err(BindableError::MutationOnLeased);
        }
        if self.disabled.get() == disabled {
            return Ok(());
        }
        self.assign_disabled(disabled, bypass, Some(source))
    }

    fn settle_disabled(
        self: &Rc<Self>,
        bypass: bool,
        source: Option<&Rc<Self>>,
        propagate: bool,
    ) -> Result<()> {
        Settlement::new(&self.peers, source, self.disabled.get())
            .propagate(propagate)
            .run(
                |peer, disabled| peer.receive_disabled(*disabled, bypass, self),
                || self.disabled.get(),
                |a, b| a == b,
                |settled| self.disabled_changed.emit(&settled),
            )
    }

    // =========================================================================
    // STRUCTURE
    // =========================================================================

    pub(crate) fn link(self: &Rc<Self>, other: &Rc<Self>) {
        self.peers.add(other);
        other.peers.add(self);
    }

    pub(crate) fn clear_listeners(&self) {
        self.value_changed.clear();
        self.disabled_changed.clear();
        if let Some(constraint) = &self.constraint {
            constraint.clear_listeners();
        }
    }

    pub(crate) fn unlink_all(self: &Rc<Self>) {
        self.peers.for_each_live(|peer| {
            peer.peers.remove(self);
        });
        self.peers.clear();
    }
}

// =============================================================================
// BINDABLE<T> - The public handle
// =============================================================================

/// A value that stays synchronized with every bindable it is bound to.
///
/// Cloning a `Bindable` clones the handle: both clones are the same node. Use
/// [`get_bound_copy`](Bindable::get_bound_copy) for an independent node that
/// follows this one.
///
/// # Example
///
/// ```
/// use spark_bindables::Bindable;
///
/// let volume = Bindable::new(5);
/// let slider = volume.get_bound_copy();
///
/// slider.set_value(8).unwrap();
/// assert_eq!(volume.value(), 8);
///
/// volume.set_disabled(true).unwrap();
/// assert!(slider.set_value(2).is_err());
/// ```
pub struct Bindable<T> {
    pub(crate) inner: Rc<Node<T>>,
}

impl<T> Clone for Bindable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Bindable<T> {
    /// Create an unbound bindable holding `value`.
    pub fn new(value: T) -> Self {
        Self::with_options(value, BindableOptions::default())
    }

    /// Create a bindable with explicit options.
    pub fn with_options(value: T, options: BindableOptions<T>) -> Self {
        Self::from_node(Node::new(value, options, None, None))
    }

    pub(crate) fn from_node(inner: Rc<Node<T>>) -> Self {
        Self { inner }
    }

    // =========================================================================
    // VALUE / DISABLED / DEFAULT
    // =========================================================================

    /// Get the current value.
    pub fn value(&self) -> T {
        self.inner.current()
    }

    /// Access the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Set the value and propagate it to every bound peer.
    ///
    /// Fails with `MutationOnDisabled` while disabled and `MutationOnLeased`
    /// while this node has granted a lease. Setting the current value is a
    /// no-op: no event fires and no peer is touched.
    pub fn set_value(&self, value: T) -> Result<()> {
        let value = match &self.inner.constraint {
            Some(c) => c.constrain(value),
            None => value,
        };
        self.inner.write_value(value)
    }

    pub fn disabled(&self) -> bool {
        self.inner.disabled.get()
    }

    /// Set the disabled flag and propagate it.
    ///
    /// Fails with `MutationOnLeased` if any node in the connected graph has
    /// granted a lease. Only the lease handle can change it then.
    pub fn set_disabled(&self, disabled: bool) -> Result<()> {
        self.inner.write_disabled(disabled)
    }

    pub fn default_value(&self) -> Option<T> {
        self.inner.default.borrow().clone()
    }

    pub fn set_default_value(&self, value: T) {
        *self.inner.default.borrow_mut() = Some(value);
    }

    /// True if a default is set and the current value equals it.
    pub fn is_default(&self) -> bool {
        match &*self.inner.default.borrow() {
            Some(default) => self.inner.holds_value(default),
            None => false,
        }
    }

    /// Set the value back to the default.
    pub fn reset_to_default(&self) -> Result<()> {
        let default = self.default_value().ok_or(BindableError::NoDefault)?;
        self.set_value(default)
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub fn on_value_changed(
        &self,
        listener: impl Fn(&ValueChangedEvent<T>) + 'static,
    ) -> Subscription {
        self.inner.value_changed.subscribe(listener)
    }

    pub fn on_disabled_changed(&self, listener: impl Fn(&bool) + 'static) -> Subscription {
        self.inner.disabled_changed.subscribe(listener)
    }

    /// Subscribe to value changes, optionally calling `listener` once right
    /// away with `(value, value)`.
    pub fn bind_value_changed(
        &self,
        run_once_immediately: bool,
        listener: impl Fn(&ValueChangedEvent<T>) + 'static,
    ) -> Subscription {
        if run_once_immediately {
            let value = self.value();
            listener(&ValueChangedEvent::new(value.clone(), value));
        }
        self.on_value_changed(listener)
    }

    pub fn bind_disabled_changed(
        &self,
        run_once_immediately: bool,
        listener: impl Fn(&bool) + 'static,
    ) -> Subscription {
        if run_once_immediately {
            listener(&self.disabled());
        }
        self.on_disabled_changed(listener)
    }

    /// Fire every change event with the current state, without touching peers.
    pub fn trigger_change(&self) -> Result<()> {
        self.inner.settle_value(self.value(), None, false)?;
        self.inner.settle_disabled(false, None, false)?;
        if let Some(constraint) = &self.inner.constraint {
            constraint.trigger_change();
        }
        Ok(())
    }

    // =========================================================================
    // BINDING
    // =========================================================================

    /// Bind to `them`: adopt their value, disabled flag and default, then
    /// link both nodes so later writes on either side reach the other.
    ///
    /// When both sides are numeric their ranges are merged first; a merge with
    /// no overlap fails with `IncompatibleRange` and nothing changes.
    pub fn bind_to(&self, them: &Bindable<T>) -> Result<()> {
        if Rc::ptr_eq(&self.inner, &them.inner) {
            return Err(BindableError::SelfBinding);
        }

        if let (Some(ours), Some(theirs)) = (&self.inner.constraint, &them.inner.constraint) {
            ours.merge_from(&self.inner, theirs.as_ref())?;
        }

        self.set_value(them.value())?;
        self.set_disabled(them.disabled())?;
        if let Some(default) = them.default_value() {
            self.set_default_value(default);
        }

        self.inner.link(&them.inner);
        debug!(peers = self.inner.peers.len(), "bound bindable");
        Ok(())
    }

    /// Remove the edge between `self` and `them`, in both directions.
    pub fn unbind_from(&self, them: &Bindable<T>) {
        self.inner.peers.remove(&them.inner);
        them.inner.peers.remove(&self.inner);
        debug!("unbound bindable");
    }

    /// Remove every listener, including numeric ones.
    pub fn unbind_events(&self) {
        self.inner.clear_listeners();
    }

    /// Remove every edge, in both directions.
    pub fn unbind_bindings(&self) {
        self.inner.unlink_all();
    }

    /// Return any lease this node granted (or, for a lease handle, return it),
    /// then remove every listener and every edge.
    pub fn unbind_all(&self) -> Result<()> {
        let granted = self.inner.active_lease.borrow().clone();
        if let Some(handle) = granted {
            Bindable::from_node(handle).unbind_all()?;
        }
        self.inner.release_lease()?;

        self.unbind_events();
        self.unbind_bindings();
        Ok(())
    }

    /// Number of live peers.
    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    pub fn is_bound_to(&self, them: &Bindable<T>) -> bool {
        self.inner.peers.contains(&them.inner)
    }

    /// True if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Bindable<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A new node of the same shape, bound to this one.
    pub fn get_bound_copy(&self) -> Bindable<T> {
        let copy = self.get_unbound_copy();
        copy.inner.link(&self.inner);
        copy
    }

    /// A new node of the same shape and state, bound to nothing.
    pub fn get_unbound_copy(&self) -> Bindable<T> {
        let constraint = self.inner.constraint.as_ref().map(|c| c.duplicate());
        Bindable::from_node(self.inner.copy(constraint))
    }

    // =========================================================================
    // PARSING
    // =========================================================================

    /// Set the value from an external input: a `T` is assigned as-is, a
    /// `String` or `&'static str` goes through the node's parser. Anything
    /// else fails with `ParseError`.
    pub fn parse(&self, input: &dyn Any) -> Result<()> {
        if let Some(value) = input.downcast_ref::<T>() {
            return self.set_value(value.clone());
        }
        let text = input
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| input.downcast_ref::<&'static str>().copied());
        match text {
            Some(text) => self.parse_str(text),
            None => Err(BindableError::ParseError {
                input: "a value of an unsupported type".into(),
                target: std::any::type_name::<T>(),
            }),
        }
    }

    /// Set the value from text using the node's parser.
    pub fn parse_str(&self, text: &str) -> Result<()> {
        let parsed = self.inner.parser.and_then(|parse| parse(text));
        match parsed {
            Some(value) => self.set_value(value),
            None => Err(BindableError::ParseError {
                input: format!("{text:?}"),
                target: std::any::type_name::<T>(),
            }),
        }
    }
}

// =============================================================================
// TYPED CONSTRUCTORS
// =============================================================================

impl<T: Clone + PartialEq + std::str::FromStr + 'static> Bindable<T> {
    /// Create a bindable whose `parse` understands `T`'s `FromStr` form.
    pub fn parsable(value: T) -> Self {
        Self::with_options(value, BindableOptions::new().parser(from_str_parser::<T>))
    }
}

impl<U: Clone + PartialEq + 'static> Bindable<Option<U>> {
    /// Create a bindable for an optional value whose default is `None`.
    pub fn nullable(value: Option<U>) -> Self {
        Self::with_options(value, BindableOptions::new().default_value(None))
    }
}

impl Bindable<bool> {
    /// Create a boolean bindable. Its parser also accepts `"1"` and `"0"`.
    pub fn flag(value: bool) -> Self {
        Self::with_options(value, BindableOptions::new().parser(parse_flag))
    }

    /// Flip the value.
    pub fn toggle(&self) -> Result<()> {
        self.set_value(!self.value())
    }
}

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for Bindable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindable")
            .field("value", &*self.inner.value.borrow())
            .field("disabled", &self.inner.disabled.get())
            .field("peers", &self.inner.peers.len())
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Bindable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.value.borrow().fmt(f)
    }
}

// =============================================================================
// TESTS
// =============================================================================

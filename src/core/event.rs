// ============================================================================
// spark-bindables - Events
// Listener lists with RAII subscriptions
// ============================================================================
//
// Listeners run synchronously and may reentrantly mutate any bindable,
// including the one that is emitting. Emission works on a snapshot of the
// listener list, so subscribing or unsubscribing from inside a listener is
// safe and takes effect on the next emission.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<A> = Rc<dyn Fn(&A)>;

// =============================================================================
// VALUE CHANGED EVENT
// =============================================================================

/// Payload of a bindable's value-changed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChangedEvent<T> {
    pub old_value: T,
    pub new_value: T,
}

impl<T> ValueChangedEvent<T> {
    pub fn new(old_value: T, new_value: T) -> Self {
        Self {
            old_value,
            new_value,
        }
    }
}

// =============================================================================
// LISTENER LIST
// =============================================================================

struct ListenerList<A> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, Listener<A>)>>,
}

/// Type-erased removal, so `Subscription` does not carry the payload type.
trait ListenerRegistry {
    fn remove(&self, id: u64);
}

impl<A> ListenerRegistry for ListenerList<A> {
    fn remove(&self, id: u64) {
        self.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }
}

/// An ordered list of listeners for payload `A`.
pub struct Event<A> {
    inner: Rc<ListenerList<A>>,
}

impl<A: 'static> Event<A> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ListenerList {
                next_id: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped or the event is cleared.
    #[must_use = "dropping the subscription unsubscribes immediately; call .detach() to keep it"]
    pub fn subscribe(&self, listener: impl Fn(&A) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let registry: Rc<dyn ListenerRegistry> = self.inner.clone();
        Subscription {
            registry: Rc::downgrade(&registry),
            id,
            active: true,
        }
    }

    /// Call every listener in registration order.
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<Listener<A>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(args);
        }
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// RAII guard for a registered listener.
///
/// Dropping it removes the listener. The guard holds the listener list weakly,
/// so it never keeps a bindable alive.
pub struct Subscription {
    registry: Weak<dyn ListenerRegistry>,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Keep the listener registered for as long as the event exists.
    pub fn detach(mut self) {
        self.active = false;
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_in_registration_order() {
        let event = Event::<i32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = event.subscribe({
            let log = log.clone();
            move |v| log.borrow_mut().push(("first", *v))
        });
        let second = event.subscribe({
            let log = log.clone();
            move |v| log.borrow_mut().push(("second", *v))
        });

        event.emit(&7);
        assert_eq!(*log.borrow(), vec![("first", 7), ("second", 7)]);

        drop(first);
        drop(second);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let event = Event::<()>::new();
        let count = Rc::new(Cell::new(0));

        let sub = event.subscribe({
            let count = count.clone();
            move |_| count.set(count.get() + 1)
        });
        event.emit(&());
        drop(sub);
        event.emit(&());

        assert_eq!(count.get(), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn detached_listener_survives() {
        let event = Event::<()>::new();
        let count = Rc::new(Cell::new(0));

        event
            .subscribe({
                let count = count.clone();
                move |_| count.set(count.get() + 1)
            })
            .detach();

        event.emit(&());
        event.emit(&());
        assert_eq!(count.get(), 2);
        assert_eq!(event.len(), 1);
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let event = Rc::new(Event::<()>::new());
        let count = Rc::new(Cell::new(0));

        event
            .subscribe({
                let event = Rc::downgrade(&event);
                let count = count.clone();
                move |_| {
                    if let Some(event) = event.upgrade() {
                        let count = count.clone();
                        event
                            .subscribe(move |_| count.set(count.get() + 1))
                            .detach();
                    }
                }
            })
            .detach();

        // The listener added during this emit is not called until the next one.
        event.emit(&());
        assert_eq!(count.get(), 0);
        event.emit(&());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn subscription_outliving_event_is_harmless() {
        let event = Event::<u8>::new();
        let sub = event.subscribe(|_| {});
        drop(event);
        drop(sub);
    }

    #[test]
    fn clear_removes_everything() {
        let event = Event::<u8>::new();
        let sub = event.subscribe(|_| {});
        event.clear();
        assert!(event.is_empty());
        drop(sub);
    }
}

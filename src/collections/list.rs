// ============================================================================
// spark-bindables - BindableList
// An ordered list kept in sync with every list it is bound to
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::error::{BindableError, Result};
use crate::core::event::{Event, Subscription};
use crate::reactivity::settle::Settlement;
use crate::reactivity::weak_set::WeakBindingSet;

// =============================================================================
// LIST NODE
// =============================================================================

pub(crate) struct ListNode<T> {
    items: RefCell<Vec<T>>,
    disabled: Cell<bool>,
    item_added: Event<T>,
    item_removed: Event<T>,
    disabled_changed: Event<bool>,
    peers: WeakBindingSet<ListNode<T>>,
}

/// One structural edit, replayed on every peer.
enum ListOp<T> {
    Insert(usize, T),
    RemoveAt(usize),
    Set(usize, T),
}

/// What an edit did locally: the item that left and the item that arrived.
struct Applied<T> {
    removed: Option<T>,
    added: Option<T>,
}

type Visited<T> = HashSet<*const ListNode<T>>;

impl<T: Clone + PartialEq + 'static> ListNode<T> {
    fn new(items: Vec<T>, disabled: bool) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
            disabled: Cell::new(disabled),
            item_added: Event::new(),
            item_removed: Event::new(),
            disabled_changed: Event::new(),
            peers: WeakBindingSet::new(),
        })
    }

    fn check_index(&self, index: usize, inclusive: bool) -> Result<()> {
        let len = self.items.borrow().len();
        let in_range = if inclusive { index <= len } else { index < len };
        if in_range {
            Ok(())
        } else {
            Err(BindableError::IndexOutOfBounds { index, len })
        }
    }

    /// Apply `op` here, replay it on every peer this operation has not
    /// reached yet, then fire this node's item events.
    fn apply(self: &Rc<Self>, op: &ListOp<T>, visited: &mut Visited<T>) -> Result<()> {
        if !visited.insert(Rc::as_ptr(self)) {
            return Ok(());
        }

        let applied = self.apply_local(op)?;
        self.peers.try_for_each_live(|peer| peer.apply(op, visited))?;

        if let Some(removed) = &applied.removed {
            self.item_removed.emit(removed);
        }
        if let Some(added) = &applied.added {
            self.item_added.emit(added);
        }
        Ok(())
    }

    fn apply_local(&self, op: &ListOp<T>) -> Result<Applied<T>> {
        match op {
            ListOp::Insert(index, item) => {
                self.check_index(*index, true)?;
                self.items.borrow_mut().insert(*index, item.clone());
                Ok(Applied {
                    removed: None,
                    added: Some(item.clone()),
                })
            }
            ListOp::RemoveAt(index) => {
                self.check_index(*index, false)?;
                let removed = self.items.borrow_mut().remove(*index);
                Ok(Applied {
                    removed: Some(removed),
                    added: None,
                })
            }
            ListOp::Set(index, item) => {
                self.check_index(*index, false)?;
                let previous = std::mem::replace(&mut self.items.borrow_mut()[*index], item.clone());
                Ok(Applied {
                    removed: Some(previous),
                    added: Some(item.clone()),
                })
            }
        }
    }

    fn receive_disabled(self: &Rc<Self>, disabled: bool, source: &Rc<Self>) -> Result<()> {
        if self.disabled.get() == disabled {
            return Ok(());
        }
        self.disabled.set(disabled);
        self.settle_disabled(Some(source), true)
    }

    fn settle_disabled(self: &Rc<Self>, source: Option<&Rc<Self>>, propagate: bool) -> Result<()> {
        Settlement::new(&self.peers, source, self.disabled.get())
            .propagate(propagate)
            .run(
                |peer, disabled| peer.receive_disabled(*disabled, self),
                || self.disabled.get(),
                |a, b| a == b,
                |settled| self.disabled_changed.emit(&settled),
            )
    }
}

// =============================================================================
// BINDABLE LIST
// =============================================================================

/// An ordered list whose structural edits are replayed on every bound list.
///
/// Each edit reaches every node in the connected graph exactly once, even when
/// the graph has cycles, and each node fires its own `item_added` /
/// `item_removed` events after the edit has reached everything below it.
///
/// # Example
///
/// ```
/// use spark_bindables::BindableList;
///
/// let playlist = BindableList::from_items(["intro", "verse"]);
/// let view = playlist.get_bound_copy();
///
/// view.push("chorus").unwrap();
/// assert_eq!(playlist.items(), vec!["intro", "verse", "chorus"]);
///
/// playlist.remove_at(0).unwrap();
/// assert_eq!(view.len(), 2);
/// ```
pub struct BindableList<T> {
    inner: Rc<ListNode<T>>,
}

impl<T: Clone + PartialEq + 'static> BindableList<T> {
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    /// Create a list holding `items`. No events fire.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            inner: ListNode::new(items.into_iter().collect(), false),
        }
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.inner.disabled.get() {
            return Err(BindableError::MutationOnDisabled);
        }
        Ok(())
    }

    fn edit(&self, op: ListOp<T>) -> Result<()> {
        self.ensure_enabled()?;
        self.inner.apply(&op, &mut Visited::new())
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.edit(ListOp::Insert(index, item))
    }

    pub fn push(&self, item: T) -> Result<()> {
        let len = self.len();
        self.insert(len, item)
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        for item in items {
            self.push(item)?;
        }
        Ok(())
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.ensure_enabled()?;
        self.inner.check_index(index, false)?;
        let item = self.inner.items.borrow()[index].clone();
        self.edit(ListOp::RemoveAt(index))?;
        Ok(item)
    }

    /// Remove the first item equal to `item`. Returns false if there was none.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.ensure_enabled()?;
        match self.index_of(item) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Replace the item at `index`, returning the previous one. Fires
    /// `item_removed` for the old item, then `item_added` for the new one.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.ensure_enabled()?;
        self.inner.check_index(index, false)?;
        let previous = self.inner.items.borrow()[index].clone();
        self.edit(ListOp::Set(index, item))?;
        Ok(previous)
    }

    /// Remove every item, front to back.
    pub fn clear(&self) -> Result<()> {
        while !self.is_empty() {
            self.remove_at(0)?;
        }
        Ok(())
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the list is empty.
    pub fn is_default(&self) -> bool {
        self.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn items(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Borrow the items without cloning. Do not mutate this list from `f`.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    pub fn contains(&self, item: &T) -> bool {
        self.inner.items.borrow().contains(item)
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.items.borrow().iter().position(|i| i == item)
    }

    // =========================================================================
    // DISABLED
    // =========================================================================

    pub fn disabled(&self) -> bool {
        self.inner.disabled.get()
    }

    pub fn set_disabled(&self, disabled: bool) -> Result<()> {
        if self.inner.disabled.get() == disabled {
            return Ok(());
        }
        self.inner.disabled.set(disabled);
        self.inner.settle_disabled(None, true)
    }

    /// Fire `disabled_changed` with the current flag, without propagating.
    pub fn trigger_change(&self) -> Result<()> {
        self.inner.settle_disabled(None, false)
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub fn on_item_added(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner.item_added.subscribe(listener)
    }

    pub fn on_item_removed(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner.item_removed.subscribe(listener)
    }

    pub fn on_disabled_changed(&self, listener: impl Fn(&bool) + 'static) -> Subscription {
        self.inner.disabled_changed.subscribe(listener)
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

    // =========================================================================
    // BINDING
    // =========================================================================

    /// Bind to `them`: replace this list's items with theirs (as edits, so
    /// this list's existing peers follow), adopt their disabled flag and link
    /// both lists.
    pub fn bind_to(&self, them: &BindableList<T>) -> Result<()> {
        if Rc::ptr_eq(&self.inner, &them.inner) {
            return Err(BindableError::SelfBinding);
        }

        self.clear()?;
        self.extend(them.items())?;
        self.set_disabled(them.disabled())?;

        self.inner.peers.add(&them.inner);
        them.inner.peers.add(&self.inner);
        debug!(peers = self.inner.peers.len(), "bound list");
        Ok(())
    }

    pub fn unbind_from(&self, them: &BindableList<T>) {
        self.inner.peers.remove(&them.inner);
        them.inner.peers.remove(&self.inner);
        debug!("unbound list");
    }

    pub fn unbind_events(&self) {
        self.inner.item_added.clear();
        self.inner.item_removed.clear();
        self.inner.disabled_changed.clear();
    }

    pub fn unbind_bindings(&self) {
        self.inner.peers.for_each_live(|peer| {
            peer.peers.remove(&self.inner);
        });
        self.inner.peers.clear();
    }

    pub fn unbind_all(&self) {
        self.unbind_events();
        self.unbind_bindings();
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    pub fn is_bound_to(&self, them: &BindableList<T>) -> bool {
        self.inner.peers.contains(&them.inner)
    }

    /// A new list with the same items and disabled flag, bound to this one.
    pub fn get_bound_copy(&self) -> BindableList<T> {
        let copy = BindableList {
            inner: ListNode::new(self.items(), self.disabled()),
        };
        copy.inner.peers.add(&self.inner);
        self.inner.peers.add(&copy.inner);
        copy
    }
}

impl<T> Clone for BindableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Default for BindableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + 'static> FromIterator<T> for BindableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

impl<T: fmt::Debug> fmt::Debug for BindableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindableList")
            .field("items", &*self.inner.items.borrow())
            .field("disabled", &self.inner.disabled.get())
            .field("peers", &self.inner.peers.len())
            .finish()
    }
}

//! Ordered item manager
//!
//! A manager owns an ordered list of named items. Items created without an
//! explicit name are "auto-named" (`#1`, `#2`, ...); after every removal the
//! auto-named items are renumbered so their suffix matches their position
//! among the auto-named items. Explicitly named items do not take a number.
//!
//! Structural changes are published to registered [`ManagerListener`]s, which
//! is how an external undo log or editor observes the manager.


use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Prefix that marks an item as auto-named
pub const AUTO_NAME_PREFIX: char = '#';

/// An entry owned by an [`ItemManager`]
pub trait Item {
    /// Display name (identity inside the manager)
    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    /// Serialize the item's persistent state
    fn to_record(&self) -> Value;

    /// Restore persistent state from a record produced by [`Item::to_record`]
    fn load_record(&mut self, record: &Value);

    fn is_auto_named(&self) -> bool {
        self.name().starts_with(AUTO_NAME_PREFIX)
    }
}

/// Observer of structural changes in a manager
///
/// All methods default to no-ops.
pub trait ManagerListener<T>: Send + Sync {
    /// An item was inserted. `undoable` is forwarded from the add call.
    fn item_added(&self, _item: &T, _undoable: bool) {}

    /// An item was removed (after renumbering the remaining ones)
    fn item_removed(&self, _item: &T) {}
}

/// Registration handle returned by `add_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) u64);

/// Ordered collection of items with auto-renaming
pub struct ItemManager<T: Item> {
    name: String,
    items: Vec<T>,
    listeners: Vec<(ListenerHandle, Arc<dyn ManagerListener<T>>)>,
    next_handle: u64,
}

impl<T: Item> ItemManager<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            listeners: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the next inserted item would get: `#` + (count + 1)
    pub fn next_auto_name(&self) -> String {
        format!("{}{}", AUTO_NAME_PREFIX, self.items.len() + 1)
    }

    /// Insert an item, restoring its state from `data` first if given
    pub fn add(&mut self, mut item: T, data: Option<&Value>, undoable: bool) -> &mut T {
        if let Some(data) = data {
            item.load_record(data);
        }

        debug!("{}: adding item '{}'", self.name, item.name());
        self.items.push(item);

        let index = self.items.len() - 1;
        for (_, listener) in &self.listeners {
            listener.item_added(&self.items[index], undoable);
        }
        &mut self.items[index]
    }

    /// Remove the item at `index`, renumber the rest, and return it
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }

        let item = self.items.remove(index);
        debug!("{}: removed item '{}'", self.name, item.name());
        self.rename_auto_named();

        for (_, listener) in &self.listeners {
            listener.item_removed(&item);
        }
        Some(item)
    }

    /// Rename every auto-named item to `#` + its 1-based ordinal among
    /// auto-named items
    pub fn rename_auto_named(&mut self) {
        let auto_named = self.items.iter_mut().filter(|item| item.is_auto_named());
        for (i, item) in auto_named.enumerate() {
            let expected = format!("{}{}", AUTO_NAME_PREFIX, i + 1);
            if item.name() != expected {
                item.set_name(expected);
            }
        }
    }

    /// Reorder items, then renumber auto-named ones
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.items.sort_by(compare);
        self.rename_auto_named();
    }

    /// Drop every item without notifying listeners (teardown / reload)
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name() == name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Serialize all items, in order
    pub fn to_record(&self) -> Value {
        Value::Array(self.items.iter().map(Item::to_record).collect())
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ManagerListener<T>>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.push((handle, listener));
        handle
    }

    /// Returns false if the handle was not registered
    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }
}

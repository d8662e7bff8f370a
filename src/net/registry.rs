//! Event subscription registry owned by one connection.
//!
//! Callbacks are stored per [`EventKind`] in registration order and invoked
//! in that order. Closures cannot be compared, so `on` hands back a
//! [`ListenerId`] that `off` uses to find the entry again.

use std::collections::HashMap;
use std::fmt;

use super::event::{Event, EventKind};

/// Boxed event callback.
pub type Callback = Box<dyn FnMut(&Event) + Send>;

/// Handle returned by [`Registry::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Callback)>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the list for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.entry(kind).or_default().push((id, Box::new(callback)));
        id
    }

    /// Remove one callback. Returns `false` when it was not registered.
    pub fn off(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let Some(index) = list.iter().position(|(listener, _)| *listener == id) else {
            return false;
        };
        drop(list.remove(index));
        if list.is_empty() {
            self.listeners.remove(&kind);
        }
        true
    }

    /// Invoke every callback registered for the event's kind. Returns how many ran.
    pub fn emit(&mut self, event: &Event) -> usize {
        let Some(list) = self.listeners.get_mut(&event.kind()) else {
            return 0;
        };
        for (_, callback) in list.iter_mut() {
            callback(event);
        }
        list.len()
    }

    /// Drop every callback.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self
            .listeners
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect::<HashMap<_, _>>();
        f.debug_struct("Registry").field("listeners", &counts).finish()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

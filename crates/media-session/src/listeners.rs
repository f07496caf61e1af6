//! Event listener registry.
//!
//! Listeners are either global (any player, one event kind) or scoped to a
//! `(player_id, kind)` pair. Registration returns an owned [`ListenerHandle`];
//! [`SubscriptionGuard`] releases a group of handles in one call.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use media_session_types::{EventKind, PlayerEvent};

/// Callback invoked for every matching event.
pub type EventHandler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ListenerScope {
    Global,
    Session(String),
}

/// Token identifying one registered listener.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    kind: EventKind,
    scope: ListenerScope,
}

impl ListenerHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Player id the listener is bound to, `None` for global listeners.
    pub fn player_id(&self) -> Option<&str> {
        match &self.scope {
            ListenerScope::Global => None,
            ListenerScope::Session(id) => Some(id),
        }
    }
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    global: HashMap<EventKind, Vec<(u64, EventHandler)>>,
    by_session: HashMap<(String, EventKind), Vec<(u64, EventHandler)>>,
}

impl ListenerRegistry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_global(&mut self, kind: EventKind, handler: EventHandler) -> ListenerHandle {
        let id = self.next_id();
        self.global.entry(kind).or_default().push((id, handler));
        ListenerHandle {
            id,
            kind,
            scope: ListenerScope::Global,
        }
    }

    pub fn add_session(
        &mut self,
        player_id: &str,
        kind: EventKind,
        handler: EventHandler,
    ) -> ListenerHandle {
        let id = self.next_id();
        self.by_session
            .entry((player_id.to_string(), kind))
            .or_default()
            .push((id, handler));
        ListenerHandle {
            id,
            kind,
            scope: ListenerScope::Session(player_id.to_string()),
        }
    }

    /// Remove one listener. Returns `true` when it was still registered.
    pub fn remove(&mut self, handle: &ListenerHandle) -> bool {
        let (list, key) = match &handle.scope {
            ListenerScope::Global => (self.global.get_mut(&handle.kind), None),
            ListenerScope::Session(player_id) => {
                let key = (player_id.clone(), handle.kind);
                (self.by_session.get_mut(&key), Some(key))
            }
        };
        let Some(list) = list else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            match key {
                Some(key) => {
                    self.by_session.remove(&key);
                }
                None => {
                    self.global.remove(&handle.kind);
                }
            }
        }
        removed
    }

    /// Drop every listener scoped to `player_id`. Returns the number removed.
    pub fn drop_session(&mut self, player_id: &str) -> usize {
        let mut removed = 0;
        self.by_session.retain(|(id, _), list| {
            if id == player_id {
                removed += list.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Handlers for `event`: session-scoped first, then global, each in
    /// registration order.
    pub fn handlers_for(&self, event: &PlayerEvent) -> Vec<EventHandler> {
        let kind = event.kind();
        let mut handlers = Vec::new();
        if let Some(list) = self
            .by_session
            .get(&(event.player_id().to_string(), kind))
        {
            handlers.extend(list.iter().map(|(_, h)| h.clone()));
        }
        if let Some(list) = self.global.get(&kind) {
            handlers.extend(list.iter().map(|(_, h)| h.clone()));
        }
        handlers
    }

    #[cfg(test)]
    pub fn session_listener_count(&self, player_id: &str) -> usize {
        self.by_session
            .iter()
            .filter(|((id, _), _)| id == player_id)
            .map(|(_, list)| list.len())
            .sum()
    }
}

/// Invoke `handlers` in order, isolating panics per handler.
///
/// Returns the number of handlers that panicked.
pub(crate) fn invoke_all(handlers: &[EventHandler], event: &PlayerEvent) -> usize {
    let mut failed = 0;
    for handler in handlers {
        if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
            failed += 1;
            tracing::warn!(
                player_id = %event.player_id(),
                kind = ?event.kind(),
                "event handler panicked"
            );
        }
    }
    failed
}

/// Owned group of listener registrations.
///
/// Dropping the guard (or calling [`SubscriptionGuard::dispose`]) removes every
/// tracked listener.
pub struct SubscriptionGuard {
    registry: Arc<Mutex<ListenerRegistry>>,
    handles: Vec<ListenerHandle>,
}

impl SubscriptionGuard {
    pub(crate) fn new(registry: Arc<Mutex<ListenerRegistry>>) -> Self {
        Self {
            registry,
            handles: Vec::new(),
        }
    }

    /// Take ownership of a listener registration.
    pub fn track(&mut self, handle: ListenerHandle) -> &mut Self {
        self.handles.push(handle);
        self
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release all tracked listeners. Returns how many were still registered.
    pub fn dispose(mut self) -> usize {
        self.release()
    }

    fn release(&mut self) -> usize {
        let handles = std::mem::take(&mut self.handles);
        let mut registry = self.registry.lock().unwrap_or_else(|err| err.into_inner());
        handles.iter().filter(|h| registry.remove(h)).count()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.release();
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("handles", &self.handles)
            .finish()
    }
}

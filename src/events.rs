//! Named-event publish/subscribe.
//!
//! A small emitter for ad-hoc event names, independent of the bridge. The
//! host fires events (`"app.pause"`) and script-side code listens for them.
//!
//! # Example
//!
//! ```ignore
//! let emitter = EventEmitter::new();
//! let id = emitter.on("hello", |msg| println!("{msg}"));
//! emitter.emit("hello", &json!("world"));
//! emitter.off("hello", id);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

// ============================================================================
// Types
// ============================================================================

/// Event listener callback.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Listener,
    once: bool,
}

// ============================================================================
// EventEmitter
// ============================================================================

/// Publish/subscribe over string event names.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<FxHashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    /// Creates an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `event`.
    pub fn on(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(event.into(), Arc::new(listener), false)
    }

    /// Registers a listener that is removed after its first invocation.
    pub fn once(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ListenerId {
        self.register(event.into(), Arc::new(listener), true)
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(registrations) = listeners.get_mut(event) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Removes every listener of `event`, or of all events when `None`.
    pub fn remove_all(&self, event: Option<&str>) {
        let mut listeners = self.listeners.write();
        match event {
            Some(event) => {
                listeners.remove(event);
            }
            None => listeners.clear(),
        }
    }

    /// Fires `event`, invoking each listener with `args`.
    ///
    /// Returns `true` if the event had listeners.
    pub fn emit(&self, event: &str, args: &Value) -> bool {
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.write();
            let Some(registrations) = listeners.get_mut(event) else {
                return false;
            };

            let snapshot = registrations
                .iter()
                .map(|registration| Arc::clone(&registration.listener))
                .collect();
            registrations.retain(|registration| !registration.once);
            if registrations.is_empty() {
                listeners.remove(event);
            }
            snapshot
        };

        trace!(event, listeners = snapshot.len(), "Emitting event");

        for listener in &snapshot {
            listener(args);
        }
        !snapshot.is_empty()
    }

    /// Returns the number of listeners for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Returns the names of events that have listeners.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.listeners.read().keys().cloned().collect()
    }

    fn register(&self, event: String, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(event)
            .or_default()
            .push(Registration { id, listener, once });
        id
    }
}

// ============================================================================
// Tests
// ============================================================================

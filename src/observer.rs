//! Observer registry with per-callback fault isolation
//!
//! Callbacks are keyed by an `ObserverId` so they can be removed later.
//! A panicking callback is caught and logged; it never propagates into the
//! notifying component and never prevents later callbacks from running.

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Handle returned by `subscribe`, used to remove the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered collection of event callbacks.
///
/// Callbacks run synchronously on the notifying thread, in subscription
/// order. They should return quickly; long-running work belongs on the
/// observer's own thread.
pub struct ObserverRegistry<E> {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn Fn(&E) + Send>)>,
}

impl<E> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ObserverRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
        }
    }

    /// Register a callback and return its removal handle.
    pub fn subscribe(&mut self, callback: impl Fn(&E) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    /// Remove a previously registered callback.
    ///
    /// Returns `false` if the id was already removed or never existed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether the registry has no callbacks.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Invoke every callback with `event`, isolating faults per callback.
    pub fn notify(&self, event: &E) {
        for (id, callback) in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!("observer {:?} panicked during notification", id);
            }
        }
    }
}

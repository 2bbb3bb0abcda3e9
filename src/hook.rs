//! Hook registry for circuit breaker state changes.

use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::state::Event;

/// Receives a notification for every state transition.
///
/// Listeners run synchronously while the breaker's lock is held, so a slow
/// listener stalls every admission decision on that breaker. They must not
/// call back into the breaker that notifies them, and must not panic.
///
/// Any `Fn(&Event)` is a listener too.
pub trait StateListener: Send + Sync + 'static {
    /// Called after the breaker changed state.
    fn on_state_change(&self, event: &Event);
}

impl<F> StateListener for F
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    fn on_state_change(&self, event: &Event) {
        self(event)
    }
}

type Listener = Arc<dyn StateListener>;

/// A registry for state change listeners.
///
/// One registry may be shared by several breakers.
pub struct HookRegistry {
    listeners: RwLock<SmallVec<[Listener; 2]>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(SmallVec::new()),
        }
    }

    /// Adds a listener invoked on every state transition.
    pub fn add_listener<L>(&self, listener: L)
    where
        L: StateListener,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Moves every listener of `other` to the end of this registry.
    pub(crate) fn append(&self, other: &HookRegistry) {
        let moved = std::mem::take(&mut *other.listeners.write());
        self.listeners.write().extend(moved);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Delivers `event` to every listener, in registration order.
    pub(crate) fn notify(&self, event: &Event) {
        for listener in self.listeners.read().iter() {
            listener.on_state_change(event);
        }
    }
}

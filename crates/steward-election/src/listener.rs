//! Listener registry: observers of leadership-state changes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Callbacks fired by the election engine on leadership transitions.
///
/// Callbacks run synchronously on the engine's dispatch path: a slow
/// listener stalls renewal timing, so return quickly and hand real work to
/// your own task. Do not register or deregister listeners from inside a
/// callback. Panics are isolated per listener and never reach the engine.
pub trait ElectionListener: Send + Sync {
    /// This candidate became leader.
    fn started_leading(&self);

    /// This candidate is no longer leader.
    fn stopped_leading(&self);

    /// The observed holder identity changed, including to this candidate
    /// and including the very first holder observed after start.
    fn new_leader(&self, identity: &str);
}

#[derive(Debug, Clone)]
pub(crate) enum ElectionEvent {
    StartedLeading,
    StoppedLeading,
    NewLeader(String),
}

/// An identity-based set of listeners.
///
/// The set lock is held for the whole dispatch pass, so every dispatch
/// sees a consistent snapshot: a listener added mid-dispatch waits for the
/// next event, a listener being removed is never half-called.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn ElectionListener>>>,
}

impl ListenerSet {
    /// Add a listener. Returns false if this exact listener is already
    /// registered.
    pub(crate) fn register(&self, listener: Arc<dyn ElectionListener>) -> bool {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a listener. Returns false if it was not registered.
    pub(crate) fn deregister(&self, listener: &Arc<dyn ElectionListener>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Dispatch one event to every registered listener, in registration
    /// order. A panicking listener is logged and skipped; the rest of the
    /// pass continues.
    pub(crate) fn notify(&self, event: &ElectionEvent) {
        let listeners = self.listeners.lock();
        for listener in listeners.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| match event {
                ElectionEvent::StartedLeading => listener.started_leading(),
                ElectionEvent::StoppedLeading => listener.stopped_leading(),
                ElectionEvent::NewLeader(identity) => listener.new_leader(identity),
            }));
            if outcome.is_err() {
                warn!(event = ?event, "election listener panicked; continuing dispatch");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

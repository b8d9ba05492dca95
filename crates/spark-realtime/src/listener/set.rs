//! Listener registration set
//!
//! Registrations are unique by `Arc` identity and notified in registration order.

use super::EventListener;
use crate::protocol::InboundEvent;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Ordered set of event listeners
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    ///
    /// Returns `false` if this exact `Arc` is already registered.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Deregister a listener
    ///
    /// Returns `false` if it was not registered.
    pub fn unsubscribe(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Deliver `event` to every listener in registration order
    ///
    /// Works on a snapshot, so listeners may (un)register during delivery;
    /// changes apply from the next event. Returns the number of listeners that
    /// handled the event without error.
    pub fn notify(&self, event: &InboundEvent) -> usize {
        let snapshot: Vec<Arc<dyn EventListener>> = self.listeners.read().clone();
        let mut delivered = 0;

        for (index, listener) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        listener = index,
                        event_type = ?event.event_type(),
                        error = %e,
                        "Listener failed to handle event"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        listener = index,
                        event_type = ?event.event_type(),
                        panic = %panic_message(panic.as_ref()),
                        "Listener panicked while handling event"
                    );
                }
            }
        }

        delivered
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

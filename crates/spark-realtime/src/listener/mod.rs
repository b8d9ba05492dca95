//! Inbound event listeners
//!
//! Observer registrations for events arriving on the realtime channel.

mod set;

pub use set::ListenerSet;

use crate::protocol::InboundEvent;
use std::sync::Arc;

/// Receives every inbound event while registered
///
/// Listeners run on the socket reader task, one event at a time, in the
/// order frames arrive. An `Err` (or a panic) is logged and does not stop
/// delivery to the remaining listeners.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &InboundEvent) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&InboundEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &InboundEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Wrap a closure as a shareable listener
///
/// Keep the returned `Arc`: removal matches on it, not on the closure.
pub fn from_fn<F>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(&InboundEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

//! Realtime wire protocol
//!
//! Outbound action envelopes and inbound event frames.

mod actions;
mod events;

pub use actions::OutboundAction;
pub use events::{event_types, InboundEvent};

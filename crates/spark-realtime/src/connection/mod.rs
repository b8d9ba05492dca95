//! Connection management
//!
//! Owns the realtime socket, its heartbeat and reconnect timers, and the
//! listener fan-out for inbound frames.

mod manager;
mod socket;
mod state;

pub use manager::ConnectionManager;
pub use state::ConnectionState;

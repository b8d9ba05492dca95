//! # spark-realtime
//!
//! Client side of the realtime WebSocket channel: one persistent socket per
//! subject, fixed-delay reconnect, periodic presence heartbeat, and fan-out
//! of inbound JSON events to registered listeners.

pub mod connection;
pub mod host;
pub mod listener;
pub mod protocol;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState};
pub use listener::{EventListener, ListenerSet};
pub use protocol::{InboundEvent, OutboundAction};
pub use transport::{MemoryPeer, MemoryTransport, Transport, TransportError, WsTransport};

//! Integration test utilities for the realtime client
//!
//! Runs the connection manager against a real WebSocket server bound to a
//! loopback port.

pub mod helpers;

pub use helpers::*;

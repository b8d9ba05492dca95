//! Socket transports
//!
//! The connection manager talks to the network only through [`Transport`],
//! which opens a text-frame sink/stream pair for a URL.

mod memory;
mod ws;

pub use memory::{MemoryPeer, MemoryTransport};
pub use ws::WsTransport;

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;
use url::Url;

/// Outgoing half of an open socket, accepting text frames
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Incoming half of an open socket, yielding text frames
///
/// End of stream means the socket closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Opens sockets for the connection manager
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a socket to `url`
    ///
    /// Resolves once the socket is open; an error counts as a close.
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// Transport error type
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol or I/O failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The remote end refused the connection
    #[error("Connection refused: {0}")]
    Refused(String),

    /// The socket is already closed
    #[error("Socket closed")]
    Closed,
}

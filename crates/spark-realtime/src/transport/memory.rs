//! In-process transport
//!
//! Each `open` creates a channel pair and hands the far end to whoever holds
//! the [`MemoryTransport`] as a [`MemoryPeer`]. Used by tests and by hosts
//! that want to drive the connection manager without a network.

use super::{FrameSink, FrameStream, Transport, TransportError};
use async_trait::async_trait;
use futures::channel::mpsc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc as tokio_mpsc, watch, Mutex as AsyncMutex};
use url::Url;

/// Far end of one in-memory socket
#[derive(Debug)]
pub struct MemoryPeer {
    url: Url,
    inbound: mpsc::UnboundedSender<Result<String, TransportError>>,
    outbound: tokio_mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// URL the client opened
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Value of a query parameter on the opened URL
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Deliver a text frame to the client
    ///
    /// Returns `false` if the client already dropped its end.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound.unbounded_send(Ok(text.into())).is_ok()
    }

    /// Deliver a transport error to the client
    pub fn push_error(&self, error: TransportError) -> bool {
        self.inbound.unbounded_send(Err(error)).is_ok()
    }

    /// Wait for the next frame the client sent
    ///
    /// `None` once the client dropped its end and every frame was read.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Take a frame the client already sent, without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Drain every frame sent so far
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Whether the client side of the socket is gone
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }

    /// Close the socket from the server side
    pub fn close(self) {
        self.inbound.close_channel();
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    refuse: bool,
    opened: Vec<Url>,
}

/// Transport backed by in-process channels
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    peers_tx: tokio_mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: Arc<AsyncMutex<tokio_mpsc::UnboundedReceiver<MemoryPeer>>>,
    hold_tx: Arc<watch::Sender<bool>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = tokio_mpsc::unbounded_channel();
        let (hold_tx, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            peers_tx,
            peers_rx: Arc::new(AsyncMutex::new(peers_rx)),
            hold_tx: Arc::new(hold_tx),
        }
    }

    /// Make subsequent opens fail with [`TransportError::Refused`]
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Keep opens pending until released with `hold_opens(false)`
    pub fn hold_opens(&self, hold: bool) {
        self.hold_tx.send_replace(hold);
    }

    /// Number of open attempts so far, refused ones included
    pub fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    /// URLs of every open attempt, oldest first
    pub fn opened_urls(&self) -> Vec<Url> {
        self.state.lock().opened.clone()
    }

    /// Wait for the next successfully opened socket
    pub async fn accept(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Take an already opened socket, without waiting
    pub fn try_accept(&self) -> Option<MemoryPeer> {
        self.peers_rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError> {
        let refuse = {
            let mut state = self.state.lock();
            state.opened.push(url.clone());
            state.refuse
        };
        if refuse {
            return Err(TransportError::Refused(url.to_string()));
        }

        let mut hold = self.hold_tx.subscribe();
        if hold.wait_for(|held| !held).await.is_err() {
            return Err(TransportError::Closed);
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        let (outbound_tx, outbound_rx) = tokio_mpsc::unbounded_channel();

        let peer = MemoryPeer {
            url: url.clone(),
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| TransportError::Refused("memory transport dropped".to_string()))?;

        let sink = futures::sink::unfold(outbound_tx, |tx, text: String| async move {
            tx.send(text).map_err(|_| TransportError::Closed)?;
            Ok::<_, TransportError>(tx)
        });
        Ok((Box::pin(sink), Box::pin(inbound_rx)))
    }
}

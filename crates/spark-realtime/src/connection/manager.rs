//! Connection manager
//!
//! Keeps at most one live socket, fans inbound events out to listeners, and
//! reconnects after a fixed delay whenever the socket drops without
//! `disconnect()` having been called.

use super::socket::{self, Outbound};
use super::ConnectionState;
use crate::listener::{EventListener, ListenerSet};
use crate::protocol::{InboundEvent, OutboundAction};
use crate::transport::{Transport, WsTransport};
use parking_lot::Mutex;
use spark_common::{ConfigError, RealtimeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

/// Handle to the realtime channel
///
/// Cloning is cheap and every clone drives the same connection. The
/// application builds one at start-up and passes it to whatever needs the
/// channel.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

pub(super) struct Inner {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    listeners: ListenerSet,
    slot: Mutex<Slot>,
}

/// Mutable connection state, only touched under `Inner::slot`
#[derive(Default)]
struct Slot {
    state: ConnectionState,
    subject_id: Option<String>,
    /// Bumped on every connect and disconnect; tasks carry the value they were
    /// started with and stand down once it no longer matches.
    generation: u64,
    socket: Option<SocketHandle>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

struct SocketHandle {
    connection_id: Uuid,
    task: JoinHandle<()>,
    /// Writer queue, present once the socket is open
    outbound: Option<mpsc::Sender<Outbound>>,
}

impl ConnectionManager {
    /// Create a manager that opens sockets through `transport`
    ///
    /// Nothing connects until [`connect`](Self::connect) is called.
    pub fn new(config: RealtimeConfig, transport: impl Transport) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport: Arc::new(transport),
                listeners: ListenerSet::new(),
                slot: Mutex::new(Slot::default()),
            }),
        })
    }

    /// Create a manager backed by real WebSockets
    pub fn with_websocket(config: RealtimeConfig) -> Result<Self, ConfigError> {
        Self::new(config, WsTransport::new())
    }

    /// Open the socket for `subject_id`
    ///
    /// Does nothing while a socket exists, whether open or still connecting.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, subject_id: impl Into<String>) {
        let subject_id = subject_id.into();
        let mut slot = self.inner.slot.lock();

        if let Some(socket) = &slot.socket {
            tracing::debug!(
                subject_id = %subject_id,
                connection_id = %socket.connection_id,
                state = %slot.state,
                "Connect ignored, socket already exists"
            );
            return;
        }

        self.inner.open_socket(&mut slot, subject_id);
    }

    /// Close the socket and cancel both timers
    ///
    /// Safe to call in any state. No reconnect follows. The close frame is
    /// written by the socket task in the background; use
    /// [`shutdown`](Self::shutdown) to wait for it.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Disconnect, then wait up to `grace` for the socket to finish closing
    ///
    /// Returns `false` if the socket task was still running when `grace`
    /// ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let Some(task) = self.inner.disconnect() else {
            return true;
        };

        match time::timeout(grace, task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis(), "Socket still closing at shutdown");
                false
            }
        }
    }

    /// Send an action if the socket is open
    ///
    /// Fire-and-forget: when the channel is unavailable the action is dropped
    /// and logged. Returns whether the frame was handed to the socket writer.
    pub fn send(&self, action: OutboundAction) -> bool {
        self.inner.send(action, None)
    }

    pub fn send_message(&self, chat_id: impl Into<String>, content: impl Into<String>) -> bool {
        self.send(OutboundAction::message(chat_id, content))
    }

    pub fn send_typing(&self, chat_id: impl Into<String>, is_typing: bool) -> bool {
        self.send(OutboundAction::typing(chat_id, is_typing))
    }

    pub fn send_heartbeat(&self, is_online: bool) -> bool {
        self.send(OutboundAction::heartbeat(is_online))
    }

    pub fn subscribe(&self, chat_id: impl Into<String>) -> bool {
        self.send(OutboundAction::subscribe(chat_id))
    }

    pub fn unsubscribe(&self, chat_id: impl Into<String>) -> bool {
        self.send(OutboundAction::unsubscribe(chat_id))
    }

    /// Register a listener for inbound events
    ///
    /// Returns `false` if this `Arc` is already registered.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> bool {
        self.inner.listeners.subscribe(listener)
    }

    /// Deregister a listener previously passed to [`add_listener`](Self::add_listener)
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.inner.listeners.unsubscribe(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Subject the channel is (re)connecting for, until `disconnect()`
    pub fn subject_id(&self) -> Option<String> {
        self.inner.slot.lock().subject_id.clone()
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    #[cfg(test)]
    fn timers_armed(&self) -> (bool, bool) {
        let slot = self.inner.slot.lock();
        (slot.heartbeat.is_some(), slot.reconnect.is_some())
    }
}

impl Inner {
    /// Tear down the socket and timers
    ///
    /// Returns the socket task when it was handed a close command and is
    /// still winding down.
    fn disconnect(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.slot.lock();
        slot.generation += 1;

        if let Some(reconnect) = slot.reconnect.take() {
            reconnect.abort();
        }
        if let Some(heartbeat) = slot.heartbeat.take() {
            heartbeat.abort();
        }

        let closing = slot.socket.take().and_then(|socket| {
            tracing::info!(connection_id = %socket.connection_id, "Realtime channel disconnected");
            // An open socket gets a close frame; a pending open is abandoned.
            let closed = socket
                .outbound
                .as_ref()
                .is_some_and(|outbound| outbound.try_send(Outbound::Close).is_ok());
            if closed {
                Some(socket.task)
            } else {
                socket.task.abort();
                None
            }
        });

        slot.subject_id = None;
        slot.state = ConnectionState::Disconnected;
        closing
    }

    /// Start a socket attempt; the caller has checked no socket exists
    fn open_socket(self: &Arc<Self>, slot: &mut Slot, subject_id: String) {
        if let Some(reconnect) = slot.reconnect.take() {
            reconnect.abort();
        }

        let url = match self.config.connect_url(&subject_id) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(subject_id = %subject_id, error = %e, "Invalid realtime URL");
                return;
            }
        };

        slot.generation += 1;
        let generation = slot.generation;
        let connection_id = Uuid::new_v4();

        tracing::info!(
            subject_id = %subject_id,
            connection_id = %connection_id,
            "Opening realtime channel"
        );

        let task = tokio::spawn(socket::run_socket(
            Arc::downgrade(self),
            generation,
            connection_id,
            subject_id.clone(),
            url,
        ));

        slot.subject_id = Some(subject_id);
        slot.state = ConnectionState::Connecting;
        slot.socket = Some(SocketHandle {
            connection_id,
            task,
            outbound: None,
        });
    }

    pub(super) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub(super) fn outbound_buffer(&self) -> usize {
        self.config.outbound_buffer
    }

    /// Socket open event. Returns `false` if the attempt was superseded.
    pub(super) fn handle_open(self: &Arc<Self>, generation: u64, outbound: mpsc::Sender<Outbound>) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        let Some(socket) = slot.socket.as_mut() else {
            return false;
        };
        socket.outbound = Some(outbound);
        let connection_id = socket.connection_id;

        if let Some(stale) = slot.heartbeat.take() {
            stale.abort();
        }
        slot.heartbeat = Some(tokio::spawn(socket::run_heartbeat(
            Arc::downgrade(self),
            generation,
            self.config.heartbeat_interval(),
        )));
        slot.state = ConnectionState::Open;

        tracing::info!(
            connection_id = %connection_id,
            subject_id = ?slot.subject_id,
            "Realtime channel open"
        );

        true
    }

    /// Inbound text frame
    pub(super) fn handle_frame(&self, generation: u64, text: &str) {
        if self.slot.lock().generation != generation {
            tracing::trace!("Frame from superseded socket dropped");
            return;
        }

        match InboundEvent::parse(text) {
            Ok(event) => {
                let delivered = self.listeners.notify(&event);
                tracing::trace!(
                    event_type = ?event.event_type(),
                    delivered,
                    "Inbound event dispatched"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = text.len(), "Malformed inbound frame dropped");
            }
        }
    }

    /// Socket closed, errored, or never opened
    pub(super) fn handle_close(self: &Arc<Self>, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            tracing::trace!("Close from superseded socket ignored");
            return;
        }

        if let Some(heartbeat) = slot.heartbeat.take() {
            heartbeat.abort();
        }
        // The socket task is the caller; dropping its handle just detaches it.
        let connection_id = slot.socket.take().map(|socket| socket.connection_id);
        slot.state = ConnectionState::ReconnectPending;

        if slot.reconnect.is_some() {
            tracing::debug!("Reconnect already scheduled");
            return;
        }

        let delay = self.config.reconnect_delay();
        tracing::info!(
            connection_id = ?connection_id,
            subject_id = ?slot.subject_id,
            delay_ms = delay.as_millis(),
            "Realtime channel closed, scheduling reconnect"
        );

        slot.reconnect = Some(tokio::spawn(socket::run_reconnect(
            Arc::downgrade(self),
            generation,
            delay,
        )));
    }

    /// Reconnect timer fired
    pub(super) fn reconnect(self: &Arc<Self>, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return;
        }
        // Our own handle; the timer task is finishing.
        slot.reconnect = None;

        if slot.socket.is_some() {
            return;
        }
        let Some(subject_id) = slot.subject_id.clone() else {
            slot.state = ConnectionState::Disconnected;
            return;
        };

        tracing::info!(subject_id = %subject_id, "Reconnecting realtime channel");
        self.open_socket(&mut slot, subject_id);
    }

    /// Queue a frame on the open socket
    ///
    /// With `Some(generation)` the frame is only queued if that socket attempt
    /// is still the current one.
    pub(super) fn send(&self, action: OutboundAction, generation: Option<u64>) -> bool {
        let json = match action.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(action = action.name(), error = %e, "Failed to serialize action");
                return false;
            }
        };

        let slot = self.slot.lock();
        let outbound = slot
            .socket
            .as_ref()
            .filter(|_| slot.state.is_open())
            .filter(|_| generation.is_none_or(|g| g == slot.generation))
            .and_then(|socket| socket.outbound.as_ref());

        let Some(outbound) = outbound else {
            tracing::warn!(
                action = action.name(),
                state = %slot.state,
                "Realtime channel unavailable, action dropped"
            );
            return false;
        };

        match outbound.try_send(Outbound::Frame(json)) {
            Ok(()) => {
                tracing::trace!(action = action.name(), "Action queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(action = action.name(), "Outbound buffer full, action dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(action = action.name(), "Socket writer gone, action dropped");
                false
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(heartbeat) = slot.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(reconnect) = slot.reconnect.take() {
            reconnect.abort();
        }
        // The socket task sees its writer queue close and shuts the socket.
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &slot.state)
            .field("subject_id", &slot.subject_id)
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

//! Test helpers for integration tests
//!
//! Provides a loopback WebSocket server that hands each accepted socket to
//! the test, plus polling helpers for asynchronous state.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use spark_common::RealtimeConfig;
use spark_realtime::{ConnectionManager, EventListener, InboundEvent};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use url::Url;

/// How long helpers wait before giving up
pub const WAIT: Duration = Duration::from_secs(5);

/// Loopback WebSocket server
pub struct TestServer {
    pub addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<ServerSocket>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Bind to an ephemeral port and start accepting
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let (tx, accepted) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                match ServerSocket::handshake(stream).await {
                    Ok(socket) => {
                        if tx.send(socket).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("test server handshake failed: {e}"),
                }
            }
        });

        Ok(Self {
            addr,
            accepted,
            handle,
        })
    }

    /// Endpoint clients should connect to
    pub fn endpoint(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Client config for this server with short timings
    pub fn config(&self) -> RealtimeConfig {
        RealtimeConfig {
            heartbeat_interval_ms: 60_000,
            reconnect_delay_ms: 200,
            ..RealtimeConfig::new(self.endpoint())
        }
    }

    /// Next socket accepted by the server
    pub async fn accept(&mut self) -> Result<ServerSocket> {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .context("timed out waiting for a connection")?
            .ok_or_else(|| anyhow!("server stopped"))
    }

    /// Next socket accepted within `within`, if any
    pub async fn try_accept(&mut self, within: Duration) -> Option<ServerSocket> {
        tokio::time::timeout(within, self.accepted.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Server end of one client socket
pub struct ServerSocket {
    pub url: Url,
    ws: WebSocketStream<TcpStream>,
}

impl ServerSocket {
    async fn handshake(stream: TcpStream) -> Result<Self> {
        let mut target = None;
        let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
            target = Some(req.uri().to_string());
            Ok::<_, ErrorResponse>(resp)
        })
        .await?;

        let target = target.ok_or_else(|| anyhow!("no request target"))?;
        let url = Url::parse("ws://test.local")?.join(&target)?;
        Ok(Self { url, ws })
    }

    /// Value of a query parameter on the handshake URL
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.send_text(value.to_string()).await
    }

    /// Next text frame, parsed as JSON; `None` once the client closed
    pub async fn recv_json(&mut self) -> Result<Option<Value>> {
        loop {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .context("timed out waiting for a frame")?;
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Skip data frames until the socket ends
    ///
    /// `true` if the client sent a close frame, `false` if the connection
    /// just dropped.
    pub async fn closed_cleanly(&mut self) -> Result<bool> {
        loop {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .context("timed out waiting for the socket to close")?;
            match frame {
                Some(Ok(Message::Close(_))) => return Ok(true),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return Ok(false),
            }
        }
    }

    /// Close from the server side
    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Listener that forwards every event's JSON into a channel
pub fn channel_listener() -> (Arc<dyn EventListener>, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = spark_realtime::listener::from_fn(move |event: &InboundEvent| {
        tx.send(event.as_value().clone())?;
        Ok(())
    });
    (listener, rx)
}

/// Next event from a [`channel_listener`]
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Value>) -> Result<Value> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for an event")?
        .ok_or_else(|| anyhow!("listener dropped"))
}

/// Poll until `check` holds
pub async fn wait_until(mut check: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!("condition not met in time"));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Connect `manager` as `subject_id` and wait for the open socket
pub async fn connect_open(
    server: &mut TestServer,
    manager: &ConnectionManager,
    subject_id: &str,
) -> Result<ServerSocket> {
    manager.connect(subject_id);
    let socket = server.accept().await?;
    wait_until(|| manager.is_connected()).await?;
    Ok(socket)
}

//! tokio-tungstenite transport

use super::{FrameSink, FrameStream, Transport, TransportError};
use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// WebSocket transport over tokio-tungstenite
///
/// Only text frames reach the manager. Ping/pong is answered by tungstenite,
/// binary frames are dropped, and a close frame ends the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        tracing::debug!(
            url = %url,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        let (sink, stream) = socket.split();

        let sink = sink.with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text))));

        let stream = stream.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    tracing::debug!(bytes = data.len(), "Binary frame dropped");
                    None
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Close frame received");
                    None
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

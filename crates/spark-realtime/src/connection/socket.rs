//! Background tasks behind the connection manager
//!
//! One task owns each socket (open, read, write), one drives the heartbeat,
//! and one waits out the reconnect delay. All of them hold only a weak
//! reference to the manager and report back through it.

use super::manager::Inner;
use crate::protocol::OutboundAction;
use futures::{SinkExt, StreamExt};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

/// Commands for the socket writer
#[derive(Debug)]
pub(super) enum Outbound {
    Frame(String),
    Close,
}

/// Own one socket from open to close
pub(super) async fn run_socket(
    inner: Weak<Inner>,
    generation: u64,
    connection_id: Uuid,
    subject_id: String,
    url: Url,
) {
    let span = tracing::info_span!("realtime_socket", %connection_id, %subject_id);
    drive_socket(inner, generation, url).instrument(span).await;
}

async fn drive_socket(inner: Weak<Inner>, generation: u64, url: Url) {
    let Some((transport, buffer)) = inner
        .upgrade()
        .map(|inner| (inner.transport(), inner.outbound_buffer()))
    else {
        return;
    };

    let (mut sink, mut stream) = match transport.open(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Failed to open realtime socket");
            if let Some(inner) = inner.upgrade() {
                inner.handle_close(generation);
            }
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel(buffer);
    let opened = inner
        .upgrade()
        .is_some_and(|inner| inner.handle_open(generation, outbound_tx));
    if !opened {
        let _ = sink.close().await;
        return;
    }

    let closed_locally = loop {
        tokio::select! {
            biased;

            command = outbound_rx.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = sink.send(text).await {
                        tracing::warn!(error = %e, "Failed to write frame");
                        break false;
                    }
                }
                Some(Outbound::Close) | None => break true,
            },

            frame = stream.next() => match frame {
                Some(Ok(text)) => {
                    tracing::trace!(bytes = text.len(), "Frame received");
                    match inner.upgrade() {
                        Some(inner) => inner.handle_frame(generation, &text),
                        None => break true,
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Realtime socket error");
                    break false;
                }
                None => {
                    tracing::info!("Realtime socket closed by server");
                    break false;
                }
            },
        }
    };

    if closed_locally {
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "Error while closing socket");
        }
        return;
    }

    if let Some(inner) = inner.upgrade() {
        inner.handle_close(generation);
    }
}

/// Send `{"action":"heartbeat","is_online":true}` every `period`, first one
/// `period` after open
pub(super) async fn run_heartbeat(inner: Weak<Inner>, generation: u64, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        tracing::trace!("Sending heartbeat");
        inner.send(OutboundAction::heartbeat(true), Some(generation));
    }
}

/// Wait out the reconnect delay, then reconnect
pub(super) async fn run_reconnect(inner: Weak<Inner>, generation: u64, delay: Duration) {
    time::sleep(delay).await;
    if let Some(inner) = inner.upgrade() {
        inner.reconnect(generation);
    }
}

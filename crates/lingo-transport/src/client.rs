//! Outbound WebSocket connection loop.
//!
//! [`connect`] returns a handle immediately and performs the dial on a
//! spawned task. The owner observes the connection through its
//! [`ClientHandler`]: `on_open` fires once after a successful handshake,
//! `on_message` per received text frame, and `on_closed` exactly once when
//! the connection ends for any reason, including a failed dial.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

use crate::error::{TransportError, TransportResult};

/// Capacity of the per-connection outbound frame queue.
const OUTBOX_CAPACITY: usize = 256;

/// Observer for one outbound connection.
#[async_trait]
pub trait ClientHandler: Send + Sync {
    /// The WebSocket handshake completed.
    async fn on_open(&self);

    /// A text frame arrived.
    async fn on_message(&self, raw: &str);

    /// The connection ended. Fired exactly once per [`connect`] call,
    /// whether the dial failed, the peer closed, or [`ClientConnection::close`]
    /// was used.
    async fn on_closed(&self);
}

/// Handle to an outbound connection.
///
/// Cloning is cheap; all clones refer to the same connection.
#[derive(Clone)]
pub struct ClientConnection {
    message_tx: mpsc::Sender<String>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ClientConnection {
    /// Queues a text frame for sending.
    ///
    /// Fails once the connection loop has terminated.
    pub async fn send(&self, frame: String) -> TransportResult<()> {
        self.message_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::NotConnected)
    }

    /// Signals the connection loop to shut down.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Dials `url` without blocking the caller.
///
/// The returned handle can be used right away: frames queued before the
/// handshake completes are sent once it does, and are lost if the dial
/// fails (the owner learns about that through `on_closed`).
pub fn connect(url: String, handler: Arc<dyn ClientHandler>) -> ClientConnection {
    let (message_tx, message_rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(run_client_loop(url, message_rx, shutdown_rx, handler));

    ClientConnection {
        message_tx,
        shutdown_tx: Arc::new(shutdown_tx),
    }
}

async fn run_client_loop(
    url: String,
    mut message_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    handler: Arc<dyn ClientHandler>,
) {
    debug!(url = %url, "dialing upstream");

    let dial = tokio::select! {
        result = connect_async(&url) => result,
        _ = shutdown_rx.changed() => {
            debug!(url = %url, "dial canceled");
            handler.on_closed().await;
            return;
        }
    };

    let ws_stream = match dial {
        Ok((stream, _response)) => stream,
        Err(e) => {
            debug!(url = %url, error = %e, "dial failed");
            handler.on_closed().await;
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    debug!(url = %url, "connection open");
    handler.on_open().await;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped handle counts as a close request.
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!(url = %url, "closing connection");
                    let _ = ws_tx.close().await;
                    break;
                }
            }

            frame = message_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                            warn!(url = %url, error = %e, "failed to send frame");
                            break;
                        }
                    }
                    None => {
                        debug!(url = %url, "connection handle dropped");
                        let _ = ws_tx.close().await;
                        break;
                    }
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!(url = %url, len = text.len(), "received text frame");
                        handler.on_message(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        trace!(url = %url, len = data.len(), "received binary frame");
                        handler.on_message(&String::from_utf8_lossy(&data)).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        debug!(url = %url, "peer closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(url = %url, error = %e, "connection error");
                        break;
                    }
                    None => {
                        debug!(url = %url, "connection stream ended");
                        break;
                    }
                }
            }
        }
    }

    handler.on_closed().await;
}

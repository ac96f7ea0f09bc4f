//! Inbound WebSocket listener.
//!
//! [`listen`] binds a TCP listener and serves WebSocket upgrades at the
//! root path. Every accepted connection becomes a session with a
//! process-unique numeric id and its own bounded send queue; the
//! [`ServerHandler`] sees `on_open` / `on_message` / `on_close` per
//! session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::any,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{TransportError, TransportResult};

/// Capacity of the per-session outbound frame queue.
const SESSION_QUEUE_CAPACITY: usize = 256;

/// Identifier of one client connection.
pub type SessionId = u64;

/// Observer for the listener.
#[async_trait]
pub trait ServerHandler: Send + Sync {
    /// A client connection was accepted.
    async fn on_open(&self, session: SessionHandle);

    /// A text frame arrived on a session.
    async fn on_message(&self, session_id: SessionId, raw: &str);

    /// A session ended (client close or connection error).
    async fn on_close(&self, session_id: SessionId);
}

/// Handle for sending frames to one client session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    message_tx: mpsc::Sender<String>,
}

impl SessionHandle {
    /// Creates a handle around an outbound frame queue.
    pub fn new(id: SessionId, message_tx: mpsc::Sender<String>) -> Self {
        Self { id, message_tx }
    }

    /// The session id this handle belongs to.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues a text frame for delivery to the client.
    pub async fn send(&self, frame: String) -> TransportResult<()> {
        self.message_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::NotConnected)
    }
}

/// Handle to a running listener.
///
/// Dropping the handle stops the listener.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl ListenerHandle {
    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

struct ServerState {
    handler: Arc<dyn ServerHandler>,
    next_session_id: AtomicU64,
}

/// Binds `addr` and starts serving WebSocket upgrades.
pub async fn listen(addr: &str, handler: Arc<dyn ServerHandler>) -> TransportResult<ListenerHandle> {
    let state = Arc::new(ServerState {
        handler,
        next_session_id: AtomicU64::new(1),
    });

    let router = Router::new().route("/", any(ws_handler)).with_state(state);

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
    let local_addr = listener.local_addr().map_err(|e| TransportError::BindFailed {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;

    info!(addr = %local_addr, "listening for client connections");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        if let Err(e) = server.await {
            warn!(error = %e, "listener terminated with error");
        } else {
            info!("listener stopped");
        }
    });

    Ok(ListenerHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    debug!(remote_addr = %addr, "client connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<ServerState>) {
    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(SESSION_QUEUE_CAPACITY);

    info!(session = session_id, remote_addr = %addr, "client session open");
    state
        .handler
        .on_open(SessionHandle::new(session_id, tx))
        .await;

    // Forward queued frames to the socket until either side gives up.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                trace!(session = session_id, len = text.len(), "received text frame");
                state.handler.on_message(session_id, text.as_str()).await;
            }
            Ok(Message::Binary(data)) => {
                trace!(session = session_id, len = data.len(), "received binary frame");
                state
                    .handler
                    .on_message(session_id, &String::from_utf8_lossy(&data))
                    .await;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(session = session_id, "client closed session");
                break;
            }
            Err(e) => {
                warn!(session = session_id, error = %e, "session error");
                break;
            }
        }
    }

    send_task.abort();
    state.handler.on_close(session_id).await;
    info!(session = session_id, "client session closed");
}

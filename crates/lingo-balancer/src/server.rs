//! Client-facing message routing.
//!
//! The front server sits between the WebSocket listener and the dispatch
//! engine: it tracks sessions, routes translation requests to the
//! dispatch manager and answers capability queries straight from the
//! registry's snapshot. A frame that violates the protocol is answered
//! with the error text as a plain string, deliberately not JSON, since
//! the sender already proved it does not speak the protocol.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use lingo_core::messaging::{MsgType, TransJobRequest, classify};
use lingo_core::ProtocolError;
use lingo_transport::{ListenerHandle, ServerHandler, SessionHandle, SessionId, TransportResult};

use crate::dispatch::DispatchManager;
use crate::error::FrontError;
use crate::registry::AdapterRegistry;
use crate::session::SessionTable;

/// The client-facing side of the balancer.
pub struct FrontServer {
    dispatch: Arc<DispatchManager>,
    registry: Arc<AdapterRegistry>,
    sessions: Arc<SessionTable>,
}

impl FrontServer {
    /// Wires the front server to its collaborators.
    pub fn new(
        dispatch: Arc<DispatchManager>,
        registry: Arc<AdapterRegistry>,
        sessions: Arc<SessionTable>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatch,
            registry,
            sessions,
        })
    }

    /// Starts listening for client connections on `addr`.
    pub async fn listen(self: Arc<Self>, addr: &str) -> TransportResult<ListenerHandle> {
        lingo_transport::listen(addr, self).await
    }

    /// Routes one decoded frame. `Ok(Some(_))` carries an immediate reply.
    async fn handle_frame(
        &self,
        session_id: SessionId,
        raw: &str,
    ) -> Result<Option<String>, FrontError> {
        let (msg_type, value) = classify(raw)?;
        match msg_type {
            MsgType::TransJobReq => {
                let request: TransJobRequest =
                    serde_json::from_value(value).map_err(ProtocolError::from)?;
                self.dispatch.translate(session_id, request).await?;
                Ok(None)
            }
            MsgType::SuppLangReq => Ok(Some(self.registry.supported_languages_json())),
            other => Err(ProtocolError::UnsupportedMsgType(other.code()).into()),
        }
    }
}

#[async_trait]
impl ServerHandler for FrontServer {
    async fn on_open(&self, session: SessionHandle) {
        debug!(session = session.id(), "session opened");
        self.sessions.open(session);
    }

    async fn on_message(&self, session_id: SessionId, raw: &str) {
        match self.handle_frame(session_id, raw).await {
            Ok(Some(reply)) => {
                if let Some(handle) = self.sessions.get(session_id) {
                    if let Err(e) = handle.send(reply).await {
                        debug!(session = session_id, error = %e, "failed to send reply");
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(session = session_id, error = %err, "rejecting client frame");
                if let Some(handle) = self.sessions.get(session_id) {
                    let _ = handle.send(err.to_string()).await;
                }
            }
        }
    }

    async fn on_close(&self, session_id: SessionId) {
        debug!(session = session_id, "session closed");
        self.sessions.close(session_id);
        self.dispatch.on_session_closed(session_id).await;
    }
}

//! Managed connection to one upstream translation server.
//!
//! An adapter owns at most one outbound WebSocket connection and walks a
//! small lifecycle:
//!
//! ```text
//! Disabled ──enable──► Connecting ──languages reply──► Connected
//!    ▲                     │                               │
//!    │                     └───────── closed ──────────────┤
//! disable                                                  ▼
//!    └───────────────────────────────────────── AwaitingReconnect
//! ```
//!
//! On a successful handshake the adapter asks the upstream for its
//! supported languages; the reply both completes the transition to
//! `Connected` and tells the observer which language pairs this upstream
//! serves. A closed connection is only reported if the adapter had reached
//! `Connected`, so failed dial attempts do not spam the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use lingo_core::messaging::{MsgType, SuppLangRequest, SuppLangResponse, TransJobResponse, classify};
use lingo_transport::client::{ClientConnection, ClientHandler, connect};

use crate::error::AdapterError;

/// Process-unique identifier of an adapter.
pub type AdapterId = u32;

static NEXT_ADAPTER_ID: AtomicU32 = AtomicU32::new(1);

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Configured but not running.
    Disabled,
    /// Dial in progress or waiting for the languages reply.
    Connecting,
    /// Handshake complete, ready to take jobs.
    Connected,
    /// Lost the connection; the reconnect loop will retry.
    AwaitingReconnect,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disabled => "DISABLED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::AwaitingReconnect => "AWAITING RE-CONNECT",
        };
        f.write_str(label)
    }
}

/// Operator-supplied parameters for one upstream server.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Unique upstream name from the configuration.
    pub name: String,
    /// `ws://` or `wss://` URL of the upstream.
    pub url: String,
    /// Selection weight; 0 means never picked among multiple candidates.
    pub load_weight: u32,
}

/// Observer for adapter events.
///
/// One edge per notification the rest of the system cares about: route
/// membership (`adapter_ready` / `adapter_closed`) and in-flight job
/// handling (`upstream_response` / `adapter_disconnected`).
#[async_trait]
pub trait AdapterObserver: Send + Sync {
    /// The adapter finished its handshake and reported its language pairs.
    async fn adapter_ready(
        &self,
        adapter: &Arc<UpstreamAdapter>,
        languages: BTreeMap<String, Vec<String>>,
    );

    /// A previously connected adapter lost its connection.
    async fn adapter_closed(&self, adapter: &Arc<UpstreamAdapter>);

    /// A translation response arrived from the upstream.
    async fn upstream_response(&self, adapter_id: AdapterId, response: TransJobResponse);

    /// Jobs awaiting a reply from this adapter will never get one.
    async fn adapter_disconnected(&self, adapter_id: AdapterId);
}

struct ConnState {
    state: AdapterState,
    conn: Option<ClientConnection>,
    /// Incremented per connection attempt; stale transport callbacks
    /// carrying an older epoch are ignored.
    epoch: u64,
}

/// A managed upstream connection.
pub struct UpstreamAdapter {
    id: AdapterId,
    config: UpstreamConfig,
    /// Back-reference handed to connection tasks and observers.
    self_ref: Weak<UpstreamAdapter>,
    observer: Mutex<Option<Arc<dyn AdapterObserver>>>,
    conn_state: Mutex<ConnState>,
}

impl UpstreamAdapter {
    /// Creates a disabled adapter for the given upstream.
    pub fn new(config: UpstreamConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            id: NEXT_ADAPTER_ID.fetch_add(1, Ordering::Relaxed),
            config,
            self_ref: self_ref.clone(),
            observer: Mutex::new(None),
            conn_state: Mutex::new(ConnState {
                state: AdapterState::Disabled,
                conn: None,
                epoch: 0,
            }),
        })
    }

    /// The process-unique adapter id.
    pub fn id(&self) -> AdapterId {
        self.id
    }

    /// The configured upstream name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configured upstream URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// The configured selection weight.
    pub fn weight(&self) -> u32 {
        self.config.load_weight
    }

    /// The current lifecycle state.
    pub fn state(&self) -> AdapterState {
        self.conn_state.lock().state
    }

    /// Installs the observer. The adapter must be disabled.
    pub fn configure(&self, observer: Arc<dyn AdapterObserver>) -> Result<(), AdapterError> {
        let guard = self.conn_state.lock();
        if guard.state != AdapterState::Disabled {
            return Err(AdapterError::AlreadyEnabled(self.config.name.clone()));
        }
        *self.observer.lock() = Some(observer);
        Ok(())
    }

    /// Starts the adapter: transitions `Disabled` to `Connecting` and
    /// begins a non-blocking dial.
    pub fn enable(&self) -> Result<(), AdapterError> {
        if self.observer.lock().is_none() {
            return Err(AdapterError::NotConfigured(self.config.name.clone()));
        }
        let mut guard = self.conn_state.lock();
        if guard.state != AdapterState::Disabled {
            debug!(adapter = %self.config.name, "already enabled");
            return Ok(());
        }
        debug!(adapter = %self.config.name, url = %self.config.url, "enabling adapter");
        self.open_connection(&mut guard);
        Ok(())
    }

    /// Stops the adapter and tears down any connection.
    pub fn disable(&self) {
        let conn = {
            let mut guard = self.conn_state.lock();
            guard.state = AdapterState::Disabled;
            guard.conn.take()
        };
        if let Some(conn) = conn {
            conn.close();
        }
        debug!(adapter = %self.config.name, "adapter disabled");
    }

    /// Retries the connection if the adapter is enabled and disconnected.
    ///
    /// Idempotent: a disabled, connecting or connected adapter is left
    /// untouched.
    pub fn reconnect(&self) {
        let stale = {
            let mut guard = self.conn_state.lock();
            if guard.state != AdapterState::AwaitingReconnect {
                return;
            }
            let stale = guard.conn.take();
            debug!(adapter = %self.config.name, "re-connecting adapter");
            self.open_connection(&mut guard);
            stale
        };
        if let Some(conn) = stale {
            conn.close();
        }
    }

    /// Queues a frame for the upstream.
    pub async fn send(&self, frame: String) -> Result<(), AdapterError> {
        let conn = {
            let guard = self.conn_state.lock();
            if guard.state != AdapterState::Connected {
                return Err(AdapterError::NotConnected(self.config.name.clone()));
            }
            guard.conn.clone()
        };
        match conn {
            Some(conn) => Ok(conn.send(frame).await?),
            None => Err(AdapterError::NotConnected(self.config.name.clone())),
        }
    }

    /// Dials the upstream. Caller holds the state lock.
    fn open_connection(&self, guard: &mut ConnState) {
        guard.epoch += 1;
        guard.state = AdapterState::Connecting;
        let link = Arc::new(AdapterLink {
            adapter: self.self_ref.clone(),
            epoch: guard.epoch,
        });
        guard.conn = Some(connect(self.config.url.clone(), link));
    }

    fn observer(&self) -> Option<Arc<dyn AdapterObserver>> {
        self.observer.lock().clone()
    }

    fn current_epoch(&self) -> u64 {
        self.conn_state.lock().epoch
    }

    async fn handle_open(&self, epoch: u64) {
        let conn = {
            let guard = self.conn_state.lock();
            if guard.epoch != epoch || guard.state != AdapterState::Connecting {
                return;
            }
            guard.conn.clone()
        };
        debug!(adapter = %self.config.name, "connection open, requesting supported languages");
        let request = match serde_json::to_string(&SuppLangRequest::new()) {
            Ok(request) => request,
            Err(e) => {
                error!(adapter = %self.config.name, error = %e, "failed to encode languages request");
                return;
            }
        };
        if let Some(conn) = conn {
            if let Err(e) = conn.send(request).await {
                warn!(adapter = %self.config.name, error = %e, "failed to request supported languages");
            }
        }
    }

    async fn handle_message(&self, epoch: u64, raw: &str) {
        if self.current_epoch() != epoch {
            return;
        }
        let (msg_type, value) = match classify(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(adapter = %self.config.name, error = %e, "dropping undecodable upstream frame");
                return;
            }
        };
        match msg_type {
            MsgType::TransJobResp => match serde_json::from_value::<TransJobResponse>(value) {
                Ok(response) => {
                    if let Some(observer) = self.observer() {
                        observer.upstream_response(self.id, response).await;
                    }
                }
                Err(e) => {
                    warn!(adapter = %self.config.name, error = %e, "dropping malformed translation response");
                }
            },
            MsgType::SuppLangResp => match serde_json::from_value::<SuppLangResponse>(value) {
                Ok(response) => self.handle_languages(epoch, response.languages).await,
                Err(e) => {
                    warn!(adapter = %self.config.name, error = %e, "dropping malformed languages response");
                }
            },
            other => {
                warn!(
                    adapter = %self.config.name,
                    msg_type = other.code(),
                    "dropping unexpected upstream message"
                );
            }
        }
    }

    async fn handle_languages(&self, epoch: u64, languages: BTreeMap<String, Vec<String>>) {
        {
            let mut guard = self.conn_state.lock();
            if guard.epoch != epoch || guard.state == AdapterState::Disabled {
                return;
            }
            guard.state = AdapterState::Connected;
        }
        debug!(adapter = %self.config.name, pairs = languages.len(), "adapter ready");
        let me = self.self_ref.upgrade();
        if let (Some(observer), Some(me)) = (self.observer(), me) {
            observer.adapter_ready(&me, languages).await;
        }
    }

    async fn handle_closed(&self, epoch: u64) {
        let was_connected = {
            let mut guard = self.conn_state.lock();
            if guard.epoch != epoch {
                return;
            }
            let was_connected = guard.state == AdapterState::Connected;
            guard.conn = None;
            if guard.state != AdapterState::Disabled {
                guard.state = AdapterState::AwaitingReconnect;
            }
            was_connected
        };
        // Failed dial attempts come through here too; only a connection
        // that had fully handshaken is worth announcing.
        if was_connected {
            warn!(adapter = %self.config.name, "upstream disconnected");
            let me = self.self_ref.upgrade();
            if let (Some(observer), Some(me)) = (self.observer(), me) {
                observer.adapter_closed(&me).await;
                observer.adapter_disconnected(self.id).await;
            }
        } else {
            debug!(adapter = %self.config.name, "connection attempt failed");
        }
    }
}

impl fmt::Debug for UpstreamAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamAdapter")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .field("load_weight", &self.config.load_weight)
            .field("state", &self.state())
            .finish()
    }
}

/// Bridges transport callbacks for one connection attempt back to the
/// adapter that owns it.
struct AdapterLink {
    adapter: Weak<UpstreamAdapter>,
    epoch: u64,
}

#[async_trait]
impl ClientHandler for AdapterLink {
    async fn on_open(&self) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.handle_open(self.epoch).await;
        }
    }

    async fn on_message(&self, raw: &str) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.handle_message(self.epoch, raw).await;
        }
    }

    async fn on_closed(&self) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.handle_closed(self.epoch).await;
        }
    }
}

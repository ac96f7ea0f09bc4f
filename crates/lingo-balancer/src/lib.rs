//! # Lingo Balancer
//!
//! The dispatch engine: everything between the client-facing WebSocket
//! server and the fleet of upstream translation servers.
//!
//! ## Components
//!
//! - [`adapter`]: one managed connection per upstream server, with a
//!   supported-languages handshake and an explicit lifecycle
//!   (disabled / connecting / connected / awaiting reconnect).
//! - [`registry`]: the routing index. Maps `(source, target)` language
//!   pairs to the ready adapters that serve them, draws weighted-random
//!   picks, and maintains the aggregated supported-languages snapshot.
//! - [`reconnect`]: the periodic task that retries disconnected adapters.
//! - [`job`] / [`pool`] / [`dispatch`]: the request pipeline. Each client
//!   job flows through the incoming pool, out to a chosen upstream, waits
//!   in the per-adapter correlation index, and returns through the
//!   outgoing pool.
//! - [`session`] / [`server`]: the client-facing side: session table and
//!   message routing.
//! - [`events`]: the fan-out glue wiring adapter notifications to the
//!   registry and the dispatch manager.
//!
//! ## Data flow
//!
//! ```text
//! client ──► server ──► dispatch.translate ──► incoming pool
//!                                                  │ choose + send
//!                                                  ▼
//!                                        awaiting-reply index
//!                                                  │ upstream answers
//!                                                  ▼
//! client ◄── session ◄── outgoing pool ◄── dispatch.on_upstream_response
//! ```

pub mod adapter;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod job;
pub mod pool;
pub mod reconnect;
pub mod registry;
pub mod server;
pub mod session;

pub use adapter::{AdapterId, AdapterObserver, AdapterState, UpstreamAdapter, UpstreamConfig};
pub use dispatch::{DispatchManager, DispatchStats};
pub use error::{AdapterError, DispatchError, FrontError};
pub use events::BalancerEvents;
pub use job::{BalancerJob, JobState};
pub use reconnect::ReconnectLoop;
pub use registry::AdapterRegistry;
pub use server::FrontServer;
pub use session::SessionTable;

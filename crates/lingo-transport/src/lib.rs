//! # Lingo Transport
//!
//! WebSocket plumbing for the lingo translation balancer.
//!
//! Two loops live here, both speaking text frames and both reporting to
//! the layer above through small observer traits:
//!
//! - [`client`]: the outbound connection an upstream adapter owns. Dialing
//!   is non-blocking; the caller gets a [`client::ClientConnection`] handle
//!   immediately and learns about the outcome through its
//!   [`client::ClientHandler`].
//! - [`server`]: the inbound listener clients talk to. Each accepted
//!   connection becomes a numbered session with its own send queue,
//!   surfaced to the [`server::ServerHandler`].
//!
//! Reconnection policy deliberately does *not* live here: the transport
//! reports a closed connection exactly once and the owner decides what to
//! do about it.

pub mod client;
pub mod error;
pub mod server;

pub use client::{ClientConnection, ClientHandler, connect};
pub use error::{TransportError, TransportResult};
pub use server::{ListenerHandle, ServerHandler, SessionHandle, SessionId, listen};

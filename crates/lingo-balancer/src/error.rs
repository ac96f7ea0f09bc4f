//! Error types for the dispatch engine.

use lingo_core::ProtocolError;
use lingo_transport::TransportError;
use thiserror::Error;

/// Errors from adapter lifecycle operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// `configure` was called on an adapter that is not disabled.
    #[error("adapter '{0}' must be disabled before it can be configured")]
    AlreadyEnabled(String),

    /// `enable` was called before `configure`.
    #[error("adapter '{0}' has no observer configured")]
    NotConfigured(String),

    /// A send was attempted while the adapter is not connected.
    #[error("adapter '{0}' is not connected")]
    NotConnected(String),

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from the job dispatch path.
///
/// These never escape a pool worker; they are converted into failure
/// responses for the affected job only.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No ready upstream serves the requested language pair.
    #[error("no translation server for {source_lang} -> {target}")]
    NoRoute {
        /// Requested source language.
        source_lang: String,
        /// Requested target language.
        target: String,
    },

    /// The chosen upstream could not be reached.
    #[error("failed to reach translation server: {0}")]
    SendFailed(String),

    /// The connection handle is not bound to a session.
    #[error("no session is associated with the connection")]
    SessionNotFound,

    /// The dispatch manager is shutting down.
    #[error("the balancer is shutting down")]
    Stopped,
}

/// Errors answered to a client connection as plain text.
#[derive(Debug, Error)]
pub enum FrontError {
    /// The frame violated the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The request could not be dispatched.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

//! Transport error types.

use thiserror::Error;

/// Errors that can occur in transport operations.
///
/// Connection failures are not errors here: a failed dial or a dropped
/// peer surfaces through the owner's `on_closed` callback, exactly once.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection is not open (anymore); the frame was not queued.
    #[error("connection is not open")]
    NotConnected,

    /// The listener could not bind.
    #[error("failed to bind {addr}: {reason}")]
    BindFailed {
        /// The address that failed to bind.
        addr: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while decoding an incoming frame.
///
/// A protocol error only ever affects the offending connection: the
/// balancer answers it with the error text as a plain string and keeps
/// serving everyone else.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or has the wrong shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The sender speaks a newer protocol than we do.
    #[error("protocol version mismatch: got {got}, expected <= {max}")]
    VersionTooHigh {
        /// Version claimed by the sender.
        got: u32,
        /// Highest version this balancer understands.
        max: u32,
    },

    /// The `msg_type` value is not one we recognize.
    #[error("unknown message type: {0}")]
    UnknownMsgType(i32),

    /// The message type is known but not valid in this direction.
    #[error("unsupported request type: {0}")]
    UnsupportedMsgType(i32),

    /// A required envelope field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Result type for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

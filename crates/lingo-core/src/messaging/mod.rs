//! The JSON wire protocol.
//!
//! Every frame carries the same envelope:
//!
//! ```json
//! { "prot_ver": 1, "msg_type": 3, ... }
//! ```
//!
//! `prot_ver` must be less than or equal to [`PROTOCOL_VERSION`];
//! `msg_type` selects the typed body. [`classify`] performs both checks
//! and hands back the decoded tree so the caller can extract the body it
//! expects.

mod supp_lang;
mod trans_job;

pub use supp_lang::{SuppLangRequest, SuppLangResponse};
pub use trans_job::{SentenceData, TransJobRequest, TransJobResponse};

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// The protocol version this balancer speaks.
///
/// Incoming frames claiming a higher version are rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Per-sentence and per-job status codes.
pub mod status {
    /// The job or sentence translated successfully.
    pub const OK: i32 = 0;
    /// The job or sentence failed.
    pub const ERROR: i32 = 1;
    /// The job was canceled before a result was produced.
    pub const CANCELED: i32 = 2;
}

/// The recognized `msg_type` discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Supported-languages query.
    SuppLangReq,
    /// Supported-languages answer.
    SuppLangResp,
    /// Translation job submission.
    TransJobReq,
    /// Translation job result.
    TransJobResp,
}

impl MsgType {
    /// Returns the wire discriminant.
    pub fn code(self) -> i32 {
        match self {
            Self::SuppLangReq => 1,
            Self::SuppLangResp => 2,
            Self::TransJobReq => 3,
            Self::TransJobResp => 4,
        }
    }

    /// Maps a wire discriminant back to a message type.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::SuppLangReq),
            2 => Some(Self::SuppLangResp),
            3 => Some(Self::TransJobReq),
            4 => Some(Self::TransJobResp),
            _ => None,
        }
    }
}

/// Decodes a raw frame far enough to route it.
///
/// Parses the JSON, verifies the protocol version and resolves the
/// message type. The decoded tree is returned alongside so the caller can
/// deserialize the typed body without re-parsing.
pub fn classify(raw: &str) -> ProtocolResult<(MsgType, Value)> {
    let value: Value = serde_json::from_str(raw)?;

    let prot_ver = value
        .get("prot_ver")
        .and_then(Value::as_u64)
        .ok_or(ProtocolError::MissingField("prot_ver"))? as u32;
    if prot_ver > PROTOCOL_VERSION {
        return Err(ProtocolError::VersionTooHigh {
            got: prot_ver,
            max: PROTOCOL_VERSION,
        });
    }

    let code = value
        .get("msg_type")
        .and_then(Value::as_i64)
        .ok_or(ProtocolError::MissingField("msg_type"))? as i32;
    let msg_type = MsgType::from_code(code).ok_or(ProtocolError::UnknownMsgType(code))?;

    Ok((msg_type, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_accepts_current_version() {
        let raw = r#"{"prot_ver":1,"msg_type":1}"#;
        let (msg_type, _) = classify(raw).unwrap();
        assert_eq!(msg_type, MsgType::SuppLangReq);
    }

    #[test]
    fn classify_rejects_newer_version() {
        let raw = r#"{"prot_ver":99,"msg_type":1}"#;
        match classify(raw) {
            Err(ProtocolError::VersionTooHigh { got: 99, max }) => {
                assert_eq!(max, PROTOCOL_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn classify_rejects_unknown_type() {
        let raw = r#"{"prot_ver":1,"msg_type":42}"#;
        assert!(matches!(
            classify(raw),
            Err(ProtocolError::UnknownMsgType(42))
        ));
    }

    #[test]
    fn classify_rejects_garbage() {
        assert!(matches!(
            classify("not json at all"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            classify(r#"{"msg_type":1}"#),
            Err(ProtocolError::MissingField("prot_ver"))
        ));
    }

    #[test]
    fn msg_type_codes_round_trip() {
        for msg_type in [
            MsgType::SuppLangReq,
            MsgType::SuppLangResp,
            MsgType::TransJobReq,
            MsgType::TransJobResp,
        ] {
            assert_eq!(MsgType::from_code(msg_type.code()), Some(msg_type));
        }
        assert_eq!(MsgType::from_code(0), None);
    }
}

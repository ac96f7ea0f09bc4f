//! # Lingo Core
//!
//! Shared building blocks for the lingo translation load balancer:
//!
//! - **Wire protocol**: the JSON message envelope and the typed request /
//!   response bodies exchanged with clients and upstream translation
//!   servers ([`messaging`]).
//! - **Language registry**: the process-wide intern table mapping language
//!   names to stable numeric ids ([`lang`]).
//! - **Protocol errors**: everything that can go wrong while decoding a
//!   frame ([`error`]).
//!
//! The balancer speaks the same protocol on both legs: a translation job
//! request received from a client is forwarded upstream with only its
//! `job_id` rewritten, and the upstream response travels back with the
//! client's original `job_id` restored.

pub mod error;
pub mod lang;
pub mod messaging;

pub use error::{ProtocolError, ProtocolResult};
pub use lang::{LangUid, LanguageRegistry};
pub use messaging::{
    MsgType, PROTOCOL_VERSION, SentenceData, SuppLangRequest, SuppLangResponse, TransJobRequest,
    TransJobResponse, classify, status,
};

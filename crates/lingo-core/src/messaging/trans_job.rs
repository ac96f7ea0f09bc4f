//! Translation job request and response bodies.

use serde::{Deserialize, Serialize};

use super::{MsgType, PROTOCOL_VERSION, status};

/// A translation job submission.
///
/// Clients send this to the balancer; the balancer forwards it upstream
/// with `job_id` rewritten to a balancer-internal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransJobRequest {
    /// Protocol version of the sender.
    pub prot_ver: u32,
    /// Always [`MsgType::TransJobReq`] on the wire.
    pub msg_type: i32,
    /// Caller-chosen job identifier, echoed in the response.
    pub job_id: u64,
    /// Scheduling hint, passed through untouched.
    #[serde(default)]
    pub priority: i32,
    /// Source language name.
    pub source_lang: String,
    /// Target language name.
    pub target_lang: String,
    /// Whether the caller wants translation metadata back.
    #[serde(default)]
    pub is_trans_info: bool,
    /// The sentences to translate.
    pub source_sentences: Vec<String>,
}

impl TransJobRequest {
    /// Creates a request with the current protocol version.
    pub fn new(
        job_id: u64,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        source_sentences: Vec<String>,
    ) -> Self {
        Self {
            prot_ver: PROTOCOL_VERSION,
            msg_type: MsgType::TransJobReq.code(),
            job_id,
            priority: 0,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            is_trans_info: false,
            source_sentences,
        }
    }
}

/// One translated sentence inside a [`TransJobResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceData {
    /// Per-sentence status code; 0 means translated.
    #[serde(default)]
    pub status_code: i32,
    /// Human-readable status detail.
    #[serde(default)]
    pub status_msg: String,
    /// The translated text, empty on failure.
    #[serde(default)]
    pub trans_text: String,
    /// Optional decoder stack load figures, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_load: Option<Vec<i32>>,
}

impl SentenceData {
    /// A failed sentence carrying the given status.
    pub fn failed(status_code: i32, status_msg: impl Into<String>) -> Self {
        Self {
            status_code,
            status_msg: status_msg.into(),
            trans_text: String::new(),
            stack_load: None,
        }
    }
}

/// A translation job result.
///
/// Upstream servers send this to the balancer; the balancer restores the
/// client's original `job_id` before relaying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransJobResponse {
    /// Protocol version of the sender.
    pub prot_ver: u32,
    /// Always [`MsgType::TransJobResp`] on the wire.
    pub msg_type: i32,
    /// The job this result answers.
    pub job_id: u64,
    /// Overall job status code; 0 means success.
    #[serde(default)]
    pub status_code: i32,
    /// Overall status detail.
    #[serde(default)]
    pub status_msg: String,
    /// One entry per source sentence.
    #[serde(default)]
    pub target_data: Vec<SentenceData>,
}

impl TransJobResponse {
    /// Builds a failure response produced by the balancer itself.
    ///
    /// Carries one failed entry per source sentence so the reply has the
    /// same shape a real upstream answer would have.
    pub fn failure(
        job_id: u64,
        status_code: i32,
        status_msg: impl Into<String>,
        sentence_count: usize,
    ) -> Self {
        let status_msg = status_msg.into();
        Self {
            prot_ver: PROTOCOL_VERSION,
            msg_type: MsgType::TransJobResp.code(),
            job_id,
            status_code,
            status_msg: status_msg.clone(),
            target_data: (0..sentence_count)
                .map(|_| SentenceData::failed(status_code, status_msg.clone()))
                .collect(),
        }
    }

    /// Whether the job as a whole succeeded.
    pub fn is_ok(&self) -> bool {
        self.status_code == status::OK
    }
}

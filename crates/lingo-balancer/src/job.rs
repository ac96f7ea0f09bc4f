//! Per-request job state.
//!
//! A balancer job is born when a client request is accepted, carries the
//! original request across both worker pools, and dies once a reply (real
//! or synthesized) has been delivered or the job was canceled. The
//! client's `job_id` never leaves the job: the wire copy sent upstream
//! carries the balancer-wide `local_id` instead, and the reply restores
//! the original value.
//!
//! All transitions are one-shot: concurrent failure paths (upstream
//! disconnect racing a send error, a session closing mid-dispatch) may
//! each *attempt* to fail a job, but only the first attempt wins and only
//! the winner is allowed to queue the reply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lingo_core::messaging::{TransJobRequest, TransJobResponse};
use lingo_transport::SessionId;

use crate::adapter::AdapterId;

static NEXT_BAL_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of one balancer job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted, waiting in the incoming pool.
    New,
    /// An incoming worker is choosing an upstream.
    Dispatching,
    /// Sent upstream, waiting in the correlation index.
    AwaitingReply,
    /// A reply is attached, waiting in the outgoing pool.
    Replying,
    /// Delivered.
    Done,
    /// Terminally failed or canceled.
    Failed,
}

struct JobInner {
    state: JobState,
    adapter_id: Option<AdapterId>,
    response: Option<TransJobResponse>,
    failure: Option<(i32, String)>,
    canceled: bool,
}

/// One in-flight client translation request.
pub struct BalancerJob {
    session_id: SessionId,
    local_id: u64,
    request: TransJobRequest,
    inner: Mutex<JobInner>,
}

impl BalancerJob {
    /// Creates a job for a request received on `session_id`.
    pub fn new(session_id: SessionId, request: TransJobRequest) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            local_id: NEXT_BAL_JOB_ID.fetch_add(1, Ordering::Relaxed),
            request,
            inner: Mutex::new(JobInner {
                state: JobState::New,
                adapter_id: None,
                response: None,
                failure: None,
                canceled: false,
            }),
        })
    }

    /// The owning client session.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The balancer-wide id used on the upstream leg.
    pub fn local_id(&self) -> u64 {
        self.local_id
    }

    /// The job id the client chose.
    pub fn client_job_id(&self) -> u64 {
        self.request.job_id
    }

    /// The original request.
    pub fn request(&self) -> &TransJobRequest {
        &self.request
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    /// The adapter this job was sent to, once dispatched.
    pub fn adapter_id(&self) -> Option<AdapterId> {
        self.inner.lock().adapter_id
    }

    /// Builds the wire copy for the upstream leg: the original request
    /// with `job_id` rewritten to [`Self::local_id`].
    pub fn upstream_request(&self) -> TransJobRequest {
        let mut request = self.request.clone();
        request.job_id = self.local_id;
        request
    }

    /// Claims the job for dispatching. Returns `false` when the job was
    /// canceled while queued, in which case the worker must drop it.
    pub fn begin_dispatch(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.canceled || inner.state != JobState::New {
            return false;
        }
        inner.state = JobState::Dispatching;
        true
    }

    /// Records the chosen adapter and parks the job awaiting its reply.
    pub fn mark_awaiting(&self, adapter_id: AdapterId) {
        let mut inner = self.inner.lock();
        inner.adapter_id = Some(adapter_id);
        if inner.state == JobState::Dispatching {
            inner.state = JobState::AwaitingReply;
        }
    }

    /// Attaches the upstream response. Returns `false` if the job already
    /// reached a terminal failure (e.g. a disconnect won the race).
    pub fn complete(&self, response: TransJobResponse) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != JobState::AwaitingReply {
            return false;
        }
        inner.response = Some(response);
        inner.state = JobState::Replying;
        true
    }

    /// Attempts to fail the job. One-shot: returns `true` only for the
    /// caller that actually performed the transition, which is then
    /// responsible for queueing the error reply (if one is owed).
    pub fn try_fail(&self, status_code: i32, status_msg: impl Into<String>) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            JobState::New | JobState::Dispatching | JobState::AwaitingReply => {
                inner.state = JobState::Failed;
                inner.failure = Some((status_code, status_msg.into()));
                true
            }
            _ => false,
        }
    }

    /// Marks the job canceled (client session gone). Queued jobs are then
    /// skipped by the incoming workers; no reply is owed.
    pub fn cancel(&self) {
        self.inner.lock().canceled = true;
    }

    /// Whether the owning session went away.
    pub fn is_canceled(&self) -> bool {
        self.inner.lock().canceled
    }

    /// Takes the reply owed to the client, with the client's original
    /// `job_id` restored. `None` when no reply is owed (canceled job).
    pub fn take_reply(&self) -> Option<TransJobResponse> {
        let mut inner = self.inner.lock();
        if inner.canceled {
            return None;
        }
        if let Some(mut response) = inner.response.take() {
            response.job_id = self.request.job_id;
            return Some(response);
        }
        if let Some((status_code, status_msg)) = inner.failure.take() {
            return Some(TransJobResponse::failure(
                self.request.job_id,
                status_code,
                status_msg,
                self.request.source_sentences.len(),
            ));
        }
        None
    }

    /// Marks the job fully finished.
    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        if inner.state != JobState::Failed {
            inner.state = JobState::Done;
        }
    }
}

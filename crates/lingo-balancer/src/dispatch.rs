//! The dispatch manager.
//!
//! Owns the two worker pools and every piece of in-flight job state:
//!
//! - the **awaiting-reply index** (`adapter_id -> local_id -> job`),
//!   consulted when an upstream answers and swept when an upstream dies;
//! - the **per-session job sets**, swept when a client disconnects.
//!
//! Locking: the outer awaiting map takes a reader-writer lock, each
//! adapter's sub-map its own mutex, so the hot response path only
//! contends on the affected adapter.
//!
//! Errors never cross a pool boundary: a worker converts every failure
//! into a well-formed error reply (or a silent drop, when the client is
//! already gone) and moves on.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use lingo_core::lang::LanguageRegistry;
use lingo_core::messaging::{TransJobRequest, TransJobResponse, status};
use lingo_transport::SessionId;

use crate::adapter::AdapterId;
use crate::error::DispatchError;
use crate::job::BalancerJob;
use crate::pool::TaskPool;
use crate::registry::AdapterRegistry;
use crate::session::SessionTable;

type AdapterJobs = Mutex<HashMap<u64, Arc<BalancerJob>>>;

/// Point-in-time view of the manager, for runtime reporting.
#[derive(Debug, Clone)]
pub struct DispatchStats {
    /// Jobs queued in the incoming pool.
    pub incoming_depth: usize,
    /// Jobs queued in the outgoing pool.
    pub outgoing_depth: usize,
    /// Jobs parked awaiting an upstream reply.
    pub awaiting_replies: usize,
    /// Sessions with at least one live job.
    pub active_sessions: usize,
}

/// Routes jobs from clients to upstreams and replies back.
pub struct DispatchManager {
    registry: Arc<AdapterRegistry>,
    sessions: Arc<SessionTable>,
    languages: Arc<LanguageRegistry>,
    incoming: TaskPool,
    outgoing: TaskPool,
    awaiting: RwLock<HashMap<AdapterId, Arc<AdapterJobs>>>,
    session_jobs: Mutex<HashMap<SessionId, HashMap<u64, Arc<BalancerJob>>>>,
}

impl DispatchManager {
    /// Creates a manager. Workers do not run until [`Self::start`].
    pub fn new(
        registry: Arc<AdapterRegistry>,
        sessions: Arc<SessionTable>,
        languages: Arc<LanguageRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            sessions,
            languages,
            incoming: TaskPool::new("incoming"),
            outgoing: TaskPool::new("outgoing"),
            awaiting: RwLock::new(HashMap::new()),
            session_jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Spawns the worker pools.
    pub fn start(self: Arc<Self>, request_workers: usize, response_workers: usize) {
        let manager = self.clone();
        self.incoming.start(request_workers, move |job| {
            let manager = manager.clone();
            async move { manager.process_incoming(job).await }
        });

        let manager = self.clone();
        self.outgoing.start(response_workers, move |job| {
            let manager = manager.clone();
            async move { manager.process_outgoing(job).await }
        });
    }

    /// Stops both pools, draining accepted work. Requests first so that
    /// replies produced by the last request workers still go out.
    pub async fn stop(&self) {
        self.incoming.stop().await;
        self.outgoing.stop().await;
    }

    /// Accepts a client translation request.
    ///
    /// Fails only when the session is unknown (already closed); every
    /// later problem is reported to the client as an error reply.
    pub async fn translate(
        &self,
        session_id: SessionId,
        request: TransJobRequest,
    ) -> Result<(), DispatchError> {
        if !self.sessions.contains(session_id) {
            return Err(DispatchError::SessionNotFound);
        }

        let job = BalancerJob::new(session_id, request);
        debug!(
            session = session_id,
            job = job.client_job_id(),
            local_id = job.local_id(),
            "accepted translation request"
        );

        self.session_jobs
            .lock()
            .entry(session_id)
            .or_default()
            .insert(job.local_id(), job.clone());

        let result = self.incoming.enqueue(job.clone()).await;
        if result.is_err() {
            self.forget_job(&job);
        }
        result
    }

    /// Correlates an upstream reply with its waiting job.
    ///
    /// An unknown `(adapter, job)` pair means the job was already failed
    /// or its client left; the reply is dropped silently.
    pub async fn on_upstream_response(&self, adapter_id: AdapterId, response: TransJobResponse) {
        let entry = self.awaiting.read().get(&adapter_id).cloned();
        let job = entry.and_then(|jobs| jobs.lock().remove(&response.job_id));

        match job {
            Some(job) if job.complete(response) => {
                if self.outgoing.enqueue(job).await.is_err() {
                    debug!("dropping upstream reply, balancer stopping");
                }
            }
            Some(_) => debug!(adapter = adapter_id, "job already failed, reply ignored"),
            None => debug!(
                adapter = adapter_id,
                "no job awaiting this reply, ignoring"
            ),
        }
    }

    /// Fails every job awaiting a reply from a dead adapter.
    pub async fn on_adapter_disconnect(&self, adapter_id: AdapterId) {
        let entry = self.awaiting.read().get(&adapter_id).cloned();
        let Some(entry) = entry else {
            return;
        };

        let orphans: Vec<Arc<BalancerJob>> = entry.lock().drain().map(|(_, job)| job).collect();
        if orphans.is_empty() {
            return;
        }
        warn!(
            adapter = adapter_id,
            jobs = orphans.len(),
            "failing jobs of disconnected upstream"
        );
        for job in orphans {
            if job.try_fail(status::ERROR, "translation server disconnected") {
                if self.outgoing.enqueue(job).await.is_err() {
                    break;
                }
            }
        }
    }

    /// Cancels every job owned by a closed session.
    ///
    /// No replies are produced, there is nobody left to read them, and
    /// any late upstream response will miss the index and be dropped.
    pub async fn on_session_closed(&self, session_id: SessionId) {
        let jobs = self.session_jobs.lock().remove(&session_id);
        let Some(jobs) = jobs else {
            return;
        };

        debug!(session = session_id, jobs = jobs.len(), "canceling session jobs");
        for job in jobs.values() {
            job.cancel();
            if let Some(adapter_id) = job.adapter_id() {
                if let Some(entry) = self.awaiting.read().get(&adapter_id).cloned() {
                    entry.lock().remove(&job.local_id());
                }
            }
            job.try_fail(status::CANCELED, "client session closed");
        }
    }

    /// Runtime counters for the `info` report.
    pub fn stats(&self) -> DispatchStats {
        let awaiting_replies = self
            .awaiting
            .read()
            .values()
            .map(|entry| entry.lock().len())
            .sum();
        DispatchStats {
            incoming_depth: self.incoming.depth(),
            outgoing_depth: self.outgoing.depth(),
            awaiting_replies,
            active_sessions: self.session_jobs.lock().len(),
        }
    }

    /// Incoming worker body: choose an upstream and forward the job.
    async fn process_incoming(&self, job: Arc<BalancerJob>) {
        if !job.begin_dispatch() {
            // Canceled while queued; nothing is owed to anyone.
            self.forget_job(&job);
            job.finish();
            return;
        }

        let request = job.request();
        let source = self.languages.register(&request.source_lang);
        let target = self.languages.register(&request.target_lang);

        let Some(adapter) = self.registry.choose_adapter(source, target) else {
            let reason = DispatchError::NoRoute {
                source_lang: request.source_lang.clone(),
                target: request.target_lang.clone(),
            };
            self.fail_job(job, reason.to_string()).await;
            return;
        };

        let frame = match serde_json::to_string(&job.upstream_request()) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode upstream request");
                self.fail_job(job, "internal error".to_string()).await;
                return;
            }
        };

        // Park the job before sending so a reply or a disconnect arriving
        // immediately after the send always finds it in the index.
        job.mark_awaiting(adapter.id());
        self.adapter_jobs(adapter.id())
            .lock()
            .insert(job.local_id(), job.clone());

        if let Err(e) = adapter.send(frame).await {
            self.adapter_jobs(adapter.id()).lock().remove(&job.local_id());
            let reason = DispatchError::SendFailed(e.to_string());
            self.fail_job(job, reason.to_string()).await;
        } else {
            debug!(
                local_id = job.local_id(),
                adapter = %adapter.name(),
                "job dispatched upstream"
            );
        }
    }

    /// Outgoing worker body: deliver the reply and retire the job.
    async fn process_outgoing(&self, job: Arc<BalancerJob>) {
        if let Some(reply) = job.take_reply() {
            match self.sessions.get(job.session_id()) {
                Some(handle) => match serde_json::to_string(&reply) {
                    Ok(frame) => {
                        if let Err(e) = handle.send(frame).await {
                            debug!(
                                session = job.session_id(),
                                error = %e,
                                "failed to deliver reply"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "failed to encode reply"),
                },
                None => debug!(
                    session = job.session_id(),
                    "client session gone, dropping reply"
                ),
            }
        }
        job.finish();
        self.forget_job(&job);
    }

    /// Converts a dispatch failure into an error reply for this job only.
    async fn fail_job(&self, job: Arc<BalancerJob>, reason: String) {
        debug!(local_id = job.local_id(), reason = %reason, "job failed to dispatch");
        if job.try_fail(status::ERROR, reason) {
            if self.outgoing.enqueue(job).await.is_err() {
                debug!("dropping failure reply, balancer stopping");
            }
        }
    }

    /// Looks up, lazily creating, the awaiting sub-map for an adapter.
    fn adapter_jobs(&self, adapter_id: AdapterId) -> Arc<AdapterJobs> {
        if let Some(entry) = self.awaiting.read().get(&adapter_id) {
            return entry.clone();
        }
        self.awaiting
            .write()
            .entry(adapter_id)
            .or_default()
            .clone()
    }

    /// Drops the job from its session's live set.
    fn forget_job(&self, job: &Arc<BalancerJob>) {
        let mut session_jobs = self.session_jobs.lock();
        if let Some(jobs) = session_jobs.get_mut(&job.session_id()) {
            jobs.remove(&job.local_id());
            if jobs.is_empty() {
                session_jobs.remove(&job.session_id());
            }
        }
    }
}

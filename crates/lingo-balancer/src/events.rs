//! Adapter event fan-out.
//!
//! Adapters emit four kinds of notifications; two concern route
//! membership (registry) and two concern in-flight jobs (dispatch
//! manager). This router is the single [`AdapterObserver`] every adapter
//! is configured with, keeping the adapters ignorant of who consumes
//! their events.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use lingo_core::messaging::TransJobResponse;

use crate::adapter::{AdapterId, AdapterObserver, UpstreamAdapter};
use crate::dispatch::DispatchManager;
use crate::registry::AdapterRegistry;

/// Routes adapter notifications to the registry and the dispatch manager.
pub struct BalancerEvents {
    registry: Arc<AdapterRegistry>,
    dispatch: Arc<DispatchManager>,
}

impl BalancerEvents {
    /// Wires the two consumers together.
    pub fn new(registry: Arc<AdapterRegistry>, dispatch: Arc<DispatchManager>) -> Arc<Self> {
        Arc::new(Self { registry, dispatch })
    }
}

#[async_trait]
impl AdapterObserver for BalancerEvents {
    async fn adapter_ready(
        &self,
        adapter: &Arc<UpstreamAdapter>,
        languages: BTreeMap<String, Vec<String>>,
    ) {
        self.registry.on_adapter_ready(adapter, &languages);
    }

    async fn adapter_closed(&self, adapter: &Arc<UpstreamAdapter>) {
        self.registry.on_adapter_disconnected(adapter);
    }

    async fn upstream_response(&self, adapter_id: AdapterId, response: TransJobResponse) {
        self.dispatch.on_upstream_response(adapter_id, response).await;
    }

    async fn adapter_disconnected(&self, adapter_id: AdapterId) {
        self.dispatch.on_adapter_disconnect(adapter_id).await;
    }
}

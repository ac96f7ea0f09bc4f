//! Periodic reconnect task.
//!
//! A single long-lived task wakes every `interval` and asks the registry
//! to retry whatever is disconnected. Individual disconnects do *not*
//! wake it; batching retries onto the timer avoids reconnect storms when
//! an upstream flaps.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::AdapterRegistry;

/// Handle to the running reconnect task.
pub struct ReconnectLoop {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectLoop {
    /// Spawns the loop with the configured retry interval.
    pub fn spawn(registry: Arc<AdapterRegistry>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis() as u64, "reconnect loop running");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => registry.reconnect_all(),
                    _ = token.cancelled() => break,
                }
            }
            debug!("reconnect loop stopped");
        });
        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signals the loop and waits for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "reconnect loop terminated abnormally");
            }
        }
    }
}

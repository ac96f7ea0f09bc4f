//! The composition root.
//!
//! [`Balancer`] assembles the dispatch engine from a validated
//! configuration and owns every component for the lifetime of the
//! process. Startup wires the pieces together; shutdown tears them down
//! in the order that keeps the data plane live until nothing can feed it:
//! stop accepting clients, drain the worker pools, stop the reconnect
//! loop, disable the adapters.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tracing::{info, warn};

use lingo_balancer::{
    AdapterRegistry, BalancerEvents, DispatchManager, FrontServer, ReconnectLoop, SessionTable,
};
use lingo_core::lang::LanguageRegistry;
use lingo_transport::ListenerHandle;

use crate::config::BalancerConfig;
use crate::console;

/// The assembled balancer.
pub struct Balancer {
    config: BalancerConfig,
    registry: Arc<AdapterRegistry>,
    dispatch: Arc<DispatchManager>,
    front: Arc<FrontServer>,
    sessions: Arc<SessionTable>,
    listener: Mutex<Option<ListenerHandle>>,
    reconnect: Mutex<Option<ReconnectLoop>>,
}

impl Balancer {
    /// Assembles all components from a validated configuration.
    ///
    /// Nothing runs yet; call [`Self::start`] to bring the balancer up.
    pub fn new(config: BalancerConfig) -> anyhow::Result<Arc<Self>> {
        let languages = Arc::new(LanguageRegistry::new());
        let sessions = Arc::new(SessionTable::new());
        let registry = Arc::new(AdapterRegistry::new(
            config.upstream_configs(),
            languages.clone(),
        ));
        let dispatch = DispatchManager::new(registry.clone(), sessions.clone(), languages);
        let front = FrontServer::new(dispatch.clone(), registry.clone(), sessions.clone());

        let events = BalancerEvents::new(registry.clone(), dispatch.clone());
        registry.configure_adapters(events)?;

        Ok(Arc::new(Self {
            config,
            registry,
            dispatch,
            front,
            sessions,
            listener: Mutex::new(None),
            reconnect: Mutex::new(None),
        }))
    }

    /// Brings the balancer up: worker pools, adapters, reconnect loop,
    /// client listener.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.dispatch.clone().start(
            self.config.server.request_workers,
            self.config.server.response_workers,
        );

        self.registry.enable_all()?;
        *self.reconnect.lock() = Some(ReconnectLoop::spawn(
            self.registry.clone(),
            self.config.reconnect_timeout(),
        ));

        let listener = self.front.clone().listen(&self.config.listen_addr()).await?;
        info!(
            addr = %listener.local_addr(),
            upstreams = self.registry.adapter_count(),
            "balancer started"
        );
        *self.listener.lock() = Some(listener);

        Ok(())
    }

    /// Tears the balancer down.
    pub async fn stop(&self) {
        info!("stopping the balancer");

        // Stop accepting new client connections.
        if let Some(listener) = self.listener.lock().take() {
            listener.stop();
        }

        // Drain the worker pools.
        self.dispatch.stop().await;

        // Stop retrying upstreams, then drop the connections.
        let reconnect = self.reconnect.lock().take();
        if let Some(reconnect) = reconnect {
            reconnect.stop().await;
        }
        self.registry.disable_all();

        info!("balancer stopped");
    }

    /// Runs until the console says `stop` or a shutdown signal arrives.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.start().await?;

        tokio::select! {
            _ = console::run(self) => info!("console requested shutdown"),
            _ = wait_for_signal() => info!("shutdown signal received"),
        }

        self.stop().await;
        Ok(())
    }

    /// The address the client listener bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().as_ref().map(|l| l.local_addr())
    }

    /// A human-readable runtime report for the operator console.
    pub fn report(&self) -> String {
        let stats = self.dispatch.stats();
        let mut lines = vec![
            format!("open sessions:    {}", self.sessions.len()),
            format!(
                "incoming pool:    {} queued, {} awaiting upstream replies",
                stats.incoming_depth, stats.awaiting_replies
            ),
            format!("outgoing pool:    {} queued", stats.outgoing_depth),
            format!("upstreams ({}):", self.registry.adapter_count()),
        ];
        for adapter in self.registry.adapters() {
            lines.push(format!(
                "  {} (uid: {}) -> {}",
                adapter.name(),
                adapter.id(),
                adapter.state()
            ));
        }
        lines.join("\n")
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                let _ = signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}

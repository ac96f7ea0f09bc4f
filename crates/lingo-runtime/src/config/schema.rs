//! Configuration schema.
//!
//! ```toml
//! [server]
//! port = 9007
//! request_workers = 4
//! response_workers = 4
//! reconnect_timeout_ms = 5000
//!
//! [upstreams.nlserver1]
//! url = "ws://localhost:9001"
//! load_weight = 3
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lingo_balancer::UpstreamConfig;

/// Root configuration for the balancer process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Client-facing server settings.
    pub server: ServerConfig,

    /// Upstream translation servers by name.
    ///
    /// A `BTreeMap` keeps startup logs and adapter iteration in a stable
    /// order.
    pub upstreams: BTreeMap<String, UpstreamEntry>,
}

impl BalancerConfig {
    /// The address the client-facing listener binds.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// The reconnect interval as a duration.
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.server.reconnect_timeout_ms)
    }

    /// Flattens the upstream map into adapter configurations.
    pub fn upstream_configs(&self) -> Vec<UpstreamConfig> {
        self.upstreams
            .iter()
            .map(|(name, entry)| UpstreamConfig {
                name: name.clone(),
                url: entry.url.clone(),
                load_weight: entry.load_weight,
            })
            .collect()
    }
}

/// Client-facing server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,

    /// Port to listen on. 0 picks an ephemeral port.
    pub port: u16,

    /// Whether to terminate TLS. Accepted for configuration
    /// compatibility; rejected by validation until a TLS listener exists.
    pub tls: bool,

    /// Workers draining the incoming (request) pool.
    pub request_workers: usize,

    /// Workers draining the outgoing (response) pool.
    pub response_workers: usize,

    /// Milliseconds between reconnect sweeps over disconnected upstreams.
    pub reconnect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: false,
            request_workers: default_workers(),
            response_workers: default_workers(),
            reconnect_timeout_ms: default_reconnect_timeout_ms(),
        }
    }
}

/// One upstream translation server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEntry {
    /// `ws://host:port` or `wss://host:port`.
    pub url: String,

    /// Selection weight; 0 keeps the upstream registered but never
    /// selected among multiple candidates.
    #[serde(default = "default_load_weight")]
    pub load_weight: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9007
}

fn default_workers() -> usize {
    4
}

fn default_reconnect_timeout_ms() -> u64 {
    5000
}

fn default_load_weight() -> u32 {
    1
}

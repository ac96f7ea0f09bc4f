//! # Lingo Runtime
//!
//! The outer shell of the balancer: configuration loading and validation,
//! logging setup, the composition root that assembles the dispatch engine,
//! and the operator console.
//!
//! The [`runtime::Balancer`] owns every component for the lifetime of the
//! process. There is no global mutable state; the composition root passes
//! `Arc` handles where components collaborate.

pub mod config;
pub mod console;
pub mod logging;
pub mod runtime;

pub use config::{BalancerConfig, ConfigError, ConfigResult, ServerConfig, UpstreamEntry};
pub use logging::LoggingBuilder;
pub use runtime::Balancer;

//! Balancer configuration.
//!
//! Loaded from a TOML file with environment overrides (prefix `LINGO_`,
//! `__` as the section separator), then validated before anything else
//! starts. A configuration problem is fatal at startup.

mod error;
mod loader;
mod schema;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_file, load_from_str};
pub use schema::{BalancerConfig, ServerConfig, UpstreamEntry};
pub use validation::validate_config;

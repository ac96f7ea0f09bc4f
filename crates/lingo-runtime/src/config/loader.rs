//! Configuration file loader.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::BalancerConfig;
use super::validation::validate_config;

/// Environment variable prefix for overrides, e.g.
/// `LINGO_SERVER__PORT=9010`.
const ENV_PREFIX: &str = "LINGO_";

/// Loads and validates configuration from a TOML file.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<BalancerConfig> {
    let path = path.as_ref();
    info!("loading configuration from: {}", path.display());

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let config: BalancerConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    validate_config(&config)?;

    debug!(
        upstreams = config.upstreams.len(),
        "configuration loaded successfully"
    );
    Ok(config)
}

/// Loads and validates configuration from a TOML string.
pub fn load_from_str(toml: &str) -> ConfigResult<BalancerConfig> {
    let config: BalancerConfig = Figment::new().merge(Toml::string(toml)).extract()?;
    validate_config(&config)?;
    Ok(config)
}

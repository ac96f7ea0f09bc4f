//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BalancerConfig, UpstreamEntry};

/// Validates the entire configuration.
pub fn validate_config(config: &BalancerConfig) -> ConfigResult<()> {
    validate_server_config(config)?;
    validate_upstreams(config)?;
    Ok(())
}

fn validate_server_config(config: &BalancerConfig) -> ConfigResult<()> {
    if config.server.request_workers == 0 {
        return Err(ConfigError::validation(
            "server.request_workers must be greater than 0",
        ));
    }
    if config.server.response_workers == 0 {
        return Err(ConfigError::validation(
            "server.response_workers must be greater than 0",
        ));
    }
    if config.server.reconnect_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "server.reconnect_timeout_ms must be greater than 0",
        ));
    }
    if config.server.tls {
        return Err(ConfigError::validation(
            "server.tls = true is not supported; terminate TLS in front of the balancer",
        ));
    }
    Ok(())
}

fn validate_upstreams(config: &BalancerConfig) -> ConfigResult<()> {
    if config.upstreams.is_empty() {
        return Err(ConfigError::validation(
            "at least one [upstreams.<name>] section is required",
        ));
    }
    for (name, entry) in &config.upstreams {
        validate_upstream(name, entry)?;
    }
    Ok(())
}

fn validate_upstream(name: &str, entry: &UpstreamEntry) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::validation("upstream names cannot be empty"));
    }
    if name.contains(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "upstream name '{name}' cannot contain whitespace"
        )));
    }
    validate_upstream_url(name, &entry.url)
}

/// Upstream URLs must look like `ws://host:port` or `wss://host:port`.
fn validate_upstream_url(name: &str, url: &str) -> ConfigResult<()> {
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| {
            ConfigError::validation(format!(
                "upstream '{name}' url '{url}' must start with ws:// or wss://"
            ))
        })?;

    let port_error = || {
        ConfigError::validation(format!(
            "upstream '{name}' url '{url}' must end with an explicit :<port>"
        ))
    };
    let (host, port) = rest.rsplit_once(':').ok_or_else(port_error)?;
    if host.is_empty() {
        return Err(ConfigError::validation(format!(
            "upstream '{name}' url '{url}' is missing a host"
        )));
    }
    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return Err(port_error());
    }
    port.parse::<u16>().map_err(|_| port_error())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;

    fn config_with_url(url: &str) -> String {
        format!(
            r#"
[upstreams.test]
url = "{url}"
"#
        )
    }

    #[test]
    fn accepts_ws_and_wss_urls() {
        assert!(load_from_str(&config_with_url("ws://localhost:9001")).is_ok());
        assert!(load_from_str(&config_with_url("wss://translate.example.org:443")).is_ok());
    }

    #[test]
    fn rejects_malformed_urls() {
        for url in [
            "http://localhost:9001",
            "ws://localhost",
            "ws://:9001",
            "ws://localhost:port",
            "ws://localhost:99999",
            "localhost:9001",
        ] {
            let result = load_from_str(&config_with_url(url));
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "url {url} should have been rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_workers() {
        let toml = r#"
[server]
request_workers = 0

[upstreams.a]
url = "ws://localhost:9001"
"#;
        assert!(matches!(
            load_from_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_zero_reconnect_timeout() {
        let toml = r#"
[server]
reconnect_timeout_ms = 0

[upstreams.a]
url = "ws://localhost:9001"
"#;
        assert!(matches!(
            load_from_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_empty_upstreams() {
        assert!(matches!(
            load_from_str("[server]\nport = 9007\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_tls_listener() {
        let toml = r#"
[server]
tls = true

[upstreams.a]
url = "ws://localhost:9001"
"#;
        assert!(matches!(
            load_from_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }
}

//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file could not be parsed or deserialized.
    #[error("failed to read configuration: {0}")]
    Extract(#[from] figment::Error),

    /// The configuration parsed but makes no sense.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Builds a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

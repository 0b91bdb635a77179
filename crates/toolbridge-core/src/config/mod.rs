//! Bridge configuration
//!
//! - `BridgeConfig`: endpoint, model, prompt and loop settings for one bridge
//! - `FileConfigLoader`: YAML files at user and workspace level, layered
//!   under environment overrides

mod settings;
mod file;

pub use settings::{BridgeConfig, EndpointConfig, RetryConfig};
pub use file::{load_layered, ConfigLevel, ConfigOverrides, FileConfigLoader};

use crate::error::OperationError;

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for OperationError {
    fn from(err: ConfigError) -> Self {
        let message = err.to_string();
        OperationError::validation(message)
            .with_suggestion("Fix the toolbridge configuration file or environment overrides.")
            .with_cause(err)
    }
}

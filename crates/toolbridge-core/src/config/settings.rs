//! Configuration types

use serde::{Deserialize, Serialize};

use crate::bridge::MAX_TOOL_ITERATIONS;
use super::{ConfigError, ConfigResult};

/// Where the model endpoint lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL, e.g. `http://localhost:11434`
    pub base_url: String,
    /// Path of the chat endpoint
    pub chat_path: String,
    /// Path listing installed models
    pub models_path: String,
    /// Timeout for non-streaming requests
    pub request_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_path: "/api/chat".to_string(),
            models_path: "/api/tags".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }

    pub fn models_url(&self) -> String {
        join_url(&self.base_url, &self.models_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Retry settings for network-touching operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before giving up on connection failures
    pub max_retries: u32,
    /// Constant delay between attempts
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Configuration for a bridge session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub endpoint: EndpointConfig,
    /// Model identifier as the endpoint knows it
    pub model: String,
    /// Base system prompt; tool instructions are appended per request
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Loop cap: tool-call/response cycles allowed per user turn
    pub max_tool_iterations: u32,
    pub retry: RetryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            model: "llama3.1".to_string(),
            system_prompt: "You are a helpful assistant. Use the available tools when they help answer the user.".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            max_tool_iterations: MAX_TOOL_ITERATIONS,
            retry: RetryConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint.base_url = base_url.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_max_tool_iterations(mut self, iterations: u32) -> Self {
        self.max_tool_iterations = iterations;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.retry = RetryConfig {
            max_retries,
            base_delay_ms,
        };
        self
    }

    /// Check the settings a bridge cannot run without
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        if self.max_tool_iterations == 0 {
            return Err(ConfigError::Invalid("max_tool_iterations must be positive".into()));
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Invalid("retry.max_retries must be positive".into()));
        }
        reqwest::Url::parse(&self.endpoint.base_url).map_err(|e| {
            ConfigError::Invalid(format!("endpoint {:?} is not a URL: {}", self.endpoint.base_url, e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tool_iterations, MAX_TOOL_ITERATIONS);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(BridgeConfig::new("").validate().is_err());
        assert!(BridgeConfig::new("m").with_temperature(3.5).validate().is_err());
        assert!(BridgeConfig::new("m").with_max_tokens(0).validate().is_err());
        assert!(BridgeConfig::new("m").with_max_tool_iterations(0).validate().is_err());
        assert!(BridgeConfig::new("m").with_retry(0, 10).validate().is_err());
        assert!(BridgeConfig::new("m").with_endpoint("not a url").validate().is_err());
    }

    #[test]
    fn test_url_joining() {
        let endpoint = EndpointConfig::new("http://127.0.0.1:8080/");
        assert_eq!(endpoint.chat_url(), "http://127.0.0.1:8080/api/chat");
        assert_eq!(endpoint.models_url(), "http://127.0.0.1:8080/api/tags");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: BridgeConfig = serde_yaml::from_str("model: qwen2.5\nretry:\n  max_retries: 5\n").unwrap();
        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.endpoint, EndpointConfig::default());
    }
}

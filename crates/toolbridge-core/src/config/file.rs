//! File-based configuration (YAML)
//!
//! Supports user-level (~/.config/toolbridge/config.yaml) and workspace-level
//! (.config/toolbridge/config.yaml) files. Both hold flat, optional keys; the
//! workspace file wins over the user file and environment variables win over
//! both.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::settings::BridgeConfig;
use super::{ConfigError, ConfigResult};

/// Optional settings read from one config layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Read `TOOLBRIDGE_*` variables from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let max_tool_iterations = match lookup("TOOLBRIDGE_MAX_TOOL_ITERATIONS") {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "TOOLBRIDGE_MAX_TOOL_ITERATIONS must be a positive integer, got {:?}",
                    raw
                ))
            })?),
            None => None,
        };

        Ok(Self {
            endpoint: lookup("TOOLBRIDGE_ENDPOINT").filter(|v| !v.trim().is_empty()),
            model: lookup("TOOLBRIDGE_MODEL").filter(|v| !v.trim().is_empty()),
            max_tool_iterations,
            ..Default::default()
        })
    }

    /// Layer `other` on top of `self`; set fields in `other` win
    pub fn merge(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: other.endpoint.or(self.endpoint),
            chat_path: other.chat_path.or(self.chat_path),
            models_path: other.models_path.or(self.models_path),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            model: other.model.or(self.model),
            system_prompt: other.system_prompt.or(self.system_prompt),
            temperature: other.temperature.or(self.temperature),
            max_tokens: other.max_tokens.or(self.max_tokens),
            max_tool_iterations: other.max_tool_iterations.or(self.max_tool_iterations),
            max_retries: other.max_retries.or(self.max_retries),
            retry_base_delay_ms: other.retry_base_delay_ms.or(self.retry_base_delay_ms),
        }
    }

    /// Write the set fields into `config`
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(v) = &self.endpoint {
            config.endpoint.base_url = v.clone();
        }
        if let Some(v) = &self.chat_path {
            config.endpoint.chat_path = v.clone();
        }
        if let Some(v) = &self.models_path {
            config.endpoint.models_path = v.clone();
        }
        if let Some(v) = self.request_timeout_secs {
            config.endpoint.request_timeout_secs = v;
        }
        if let Some(v) = &self.model {
            config.model = v.clone();
        }
        if let Some(v) = &self.system_prompt {
            config.system_prompt = v.clone();
        }
        if let Some(v) = self.temperature {
            config.temperature = v;
        }
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
        if let Some(v) = self.max_tool_iterations {
            config.max_tool_iterations = v;
        }
        if let Some(v) = self.max_retries {
            config.retry.max_retries = v;
        }
        if let Some(v) = self.retry_base_delay_ms {
            config.retry.base_delay_ms = v;
        }
    }
}

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/toolbridge/config.yaml)
    User,
    /// Workspace-level config (.config/toolbridge/config.yaml in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// Reads and writes one YAML config layer
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    path: PathBuf,
    level: ConfigLevel,
}

impl FileConfigLoader {
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
        }
    }

    /// User-level loader (~/.config/toolbridge/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("toolbridge").join("config.yaml"), ConfigLevel::User)
    }

    /// Workspace-level loader (.config/toolbridge/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root
            .as_ref()
            .join(".config")
            .join("toolbridge")
            .join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load this layer; a missing file is an empty layer
    pub fn load(&self) -> ConfigResult<ConfigOverrides> {
        if !self.exists() {
            return Ok(ConfigOverrides::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ConfigOverrides::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Save this layer, creating parent directories
    pub fn save(&self, overrides: &ConfigOverrides) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(overrides)?)?;
        Ok(())
    }
}

/// Build a validated config: defaults, then user file, then workspace file,
/// then environment.
pub fn load_layered(
    user: &FileConfigLoader,
    workspace: Option<&FileConfigLoader>,
    env: ConfigOverrides,
) -> ConfigResult<BridgeConfig> {
    let mut layers = user.load()?;
    if let Some(workspace) = workspace {
        layers = layers.merge(workspace.load()?);
    }
    layers = layers.merge(env);

    let mut config = BridgeConfig::default();
    layers.apply(&mut config);
    config.validate()?;
    Ok(config)
}

//! Runtime configuration.
//!
//! Loaded from YAML, every field optional:
//!
//! ```yaml
//! model:
//!   provider: openai
//!   model: gpt-4o-mini
//!   max_tokens: 4000
//!   temperature: 0.2
//!   timeout: 30s
//!   json_mode: true
//! knowledge:
//!   directory: ./coaching
//! ```
//!
//! | Env Var                | Overrides       |
//! |------------------------|-----------------|
//! | `EIGHTD_MODEL`         | `model.model`   |
//! | `EIGHTD_MODEL_TIMEOUT` | `model.timeout` |
//!
//! The API key falls back to `OPENAI_API_KEY` when `model.api_key` is unset.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;

pub const MODEL_ENV: &str = "EIGHTD_MODEL";
pub const MODEL_TIMEOUT_ENV: &str = "EIGHTD_MODEL_TIMEOUT";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub model: ModelSettings,
    pub knowledge: KnowledgeSettings,
}

/// Model endpoint and generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Registry key of the provider factory
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(with = "human_duration")]
    pub timeout: Duration,
    pub json_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let generation = CompletionConfig::default();
        Self {
            provider: "openai".to_string(),
            model: generation.model,
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
            timeout: generation.timeout,
            json_mode: generation.json_mode,
            base_url: None,
            api_key: None,
        }
    }
}

impl ModelSettings {
    /// Generation parameters for the provider call.
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            json_mode: self.json_mode,
        }
    }

    /// JSON settings handed to the provider factory.
    pub fn provider_json(&self) -> serde_json::Value {
        let mut settings = serde_json::Map::new();
        if let Some(base_url) = &self.base_url {
            settings.insert("base_url".into(), base_url.clone().into());
        }
        if let Some(api_key) = &self.api_key {
            settings.insert("api_key".into(), api_key.clone().into());
        }
        serde_json::Value::Object(settings)
    }
}

/// Where coaching documents come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// Directory of `{hint}.md` / `{hint}.txt` coaching documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&yaml)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var(MODEL_ENV).ok(),
            std::env::var(MODEL_TIMEOUT_ENV).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        model: Option<String>,
        timeout: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model.model = model.trim().to_string();
        }
        if let Some(timeout) = timeout {
            self.model.timeout =
                humantime::parse_duration(timeout.trim()).map_err(|e| ConfigError::InvalidValue {
                    key: MODEL_TIMEOUT_ENV,
                    message: e.to_string(),
                })?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "model.timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "model.max_tokens",
                message: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "model.temperature",
                message: format!("{} is outside 0.0..=2.0", self.model.temperature),
            });
        }
        Ok(())
    }
}

/// `"30s"`, `"1m 30s"` and friends.
mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

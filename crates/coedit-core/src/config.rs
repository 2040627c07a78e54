//! Configuration management for coedit
//!
//! Handles loading the server, session and engine settings from a TOML file.
//! Every section is optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and push channel settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionSettings,
    /// Chat engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Capacity of the push broadcast channel
    pub push_buffer: usize,
    /// Allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            push_buffer: 1024,
            cors: true,
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Model used when a start request names none
    pub default_model: String,
    /// Upper bound on live sessions (0 = unbounded). The least recently
    /// used session is evicted when a new one would exceed it.
    pub max_sessions: usize,
    /// Sessions untouched for this long are reaped (0 = never)
    pub idle_timeout_secs: u64,
    /// Bound on a single chat turn (0 = wait forever)
    pub send_timeout_secs: u64,
    /// Reject unknown edit formats instead of falling back to search/replace blocks
    pub strict_edit_format: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o".to_string(),
            max_sessions: 0,
            idle_timeout_secs: 0,
            send_timeout_secs: 600,
            strict_edit_format: false,
        }
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_secs > 0).then(|| Duration::from_secs(self.send_timeout_secs))
    }

    pub fn max_sessions(&self) -> Option<usize> {
        (self.max_sessions > 0).then_some(self.max_sessions)
    }
}

/// Chat engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// API key (takes precedence over the environment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Max tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature, used only when the model allows it
    pub temperature: f64,
    /// Per-file size limit when inlining chat files into the prompt
    pub max_file_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            max_tokens: 4096,
            temperature: 0.0,
            max_file_bytes: 256 * 1024,
        }
    }
}

impl EngineConfig {
    /// Get the API key, checking the configured environment variable if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        let env_name = self.api_key_env.as_ref()?;
        std::env::var(env_name).ok().filter(|k| !k.is_empty())
    }
}

/// Configuration manager for loading config files
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("coedit").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Path the configuration was (or would be) loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the manager, keeping only the configuration
    pub fn into_config(self) -> Config {
        self.config
    }
}

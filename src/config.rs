//! Configuration management for Madlen Chat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use anyhow::Context;

use crate::error::{ChatError, Result};
use crate::types::DEFAULT_MODEL;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Madlen Chat
///
/// Holds the backend endpoint settings and chat defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Chat behavior defaults
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Root URL of the chat backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for establishing the TCP/TLS connection
    ///
    /// Streamed replies themselves are never timed out.
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Optional User-Agent header sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            user_agent: None,
        }
    }
}

/// Chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model id used when none is given on the command line
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(ChatError::from)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(ChatError::from)
            .with_context(|| format!("Failed to parse config {}", path))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("MADLEN_BASE_URL") {
            self.backend.base_url = base_url;
        }

        if let Ok(model) = std::env::var("MADLEN_MODEL") {
            self.chat.default_model = model;
        }

        if let Ok(timeout) = std::env::var("MADLEN_CONNECT_TIMEOUT_SECONDS") {
            match timeout.parse::<u64>() {
                Ok(seconds) => self.backend.connect_timeout_seconds = seconds,
                Err(_) => tracing::warn!(
                    "Ignoring invalid MADLEN_CONNECT_TIMEOUT_SECONDS value: {}",
                    timeout
                ),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.base_url {
            tracing::debug!("Using base URL override: {}", base_url);
            self.backend.base_url = base_url.clone();
        }

        if let Some(model) = cli.command.model_override() {
            tracing::debug!("Using model override: {}", model);
            self.chat.default_model = model.to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if the base URL is not an http(s) URL,
    /// the default model is empty, or the connect timeout is zero
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.backend.base_url).map_err(|e| {
            ChatError::Config(format!(
                "backend.base_url is not a valid URL ({}): {}",
                self.backend.base_url, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "backend.base_url must use http or https, got: {}",
                url.scheme()
            ))
            .into());
        }

        if self.chat.default_model.trim().is_empty() {
            return Err(
                ChatError::Config("chat.default_model cannot be empty".to_string()).into(),
            );
        }

        if self.backend.connect_timeout_seconds == 0 {
            return Err(ChatError::Config(
                "backend.connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

//! Configuration for the Ratline server.
//!
//! TOML-based configuration with defaults, loaded from
//! `~/.config/ratline/config.toml` unless a path is given on the command
//! line. Environment variables override file values; command-line flags
//! override both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The port agents connect to unless configured otherwise.
pub const DEFAULT_PORT: u16 = 1337;

/// Valid log level values for the tracing filter.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must not be 0")]
    InvalidPort,

    #[error("response_timeout_secs must be at least 1, got {0}")]
    InvalidResponseTimeout(u64),

    #[error("handshake_timeout_secs must be at least 1, got {0}")]
    InvalidHandshakeTimeout(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener and process-level settings.
    pub server: ServerConfig,

    /// Per-session protocol settings.
    pub session: SessionConfig,
}

/// Listener and process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to listen on, bound to all interfaces.
    pub port: u16,

    /// Directory for server data (identity key, logs).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Per-session protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait on each read for a command response, in seconds.
    pub response_timeout_secs: u64,

    /// How long a connecting agent gets to finish the initial handshake,
    /// in seconds.
    pub handshake_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 1,
            handshake_timeout_secs: 10,
        }
    }
}

impl SessionConfig {
    /// The per-read bound on command responses.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// The per-read bound on the accept-time handshake.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ratline")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ratline")
}

impl Config {
    /// Loads configuration from the given file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Loads the default config file if it exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies environment variable overrides.
    ///
    /// Supported variables:
    /// - `RATLINE_PORT`: override the listen port
    /// - `RATLINE_LOG_LEVEL`: override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("RATLINE_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(%port, "ignoring unparsable RATLINE_PORT"),
            }
        }

        if let Ok(level) = std::env::var("RATLINE_LOG_LEVEL") {
            if !level.is_empty() {
                self.server.log_level = level;
            }
        }
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.session.response_timeout_secs == 0 {
            return Err(ConfigError::InvalidResponseTimeout(
                self.session.response_timeout_secs,
            ));
        }

        if self.session.handshake_timeout_secs == 0 {
            return Err(ConfigError::InvalidHandshakeTimeout(
                self.session.handshake_timeout_secs,
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.server.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }
}

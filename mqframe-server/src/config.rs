//! Connection configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via MQFRAME_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Framing engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-connection buffers and keep-alive.
    pub connection: ConnectionConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("MQFRAME_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Checks values that would make a connection unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.connection.apply_overrides(&var);
        self.logging.apply_overrides(&var);
    }
}

/// When the receiver's read deadline is renewed.
///
/// The default, `Sliding`, differs from a classic one-shot deadline: an
/// active client is never cut off. Use `Once` to bound every connection to
/// a single keep-alive interval from the moment its receiver starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadDeadline {
    /// Set once when the receiver starts; the connection must end within
    /// one keep-alive interval.
    Once,
    /// Renewed after every successful read.
    #[default]
    Sliding,
}

impl FromStr for ReadDeadline {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(ReadDeadline::Once),
            "sliding" => Ok(ReadDeadline::Sliding),
            other => Err(ConfigError::ValidationError(format!(
                "unknown read deadline policy '{}'",
                other
            ))),
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of the inbound ring in bytes.
    pub input_buffer_size: usize,
    /// Capacity of the outbound ring in bytes.
    pub output_buffer_size: usize,
    /// Read deadline in seconds. 0 disables it.
    pub keep_alive_secs: u64,
    /// Deadline renewal policy.
    pub read_deadline: ReadDeadline,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            input_buffer_size: 256 * 1024,
            output_buffer_size: 256 * 1024,
            keep_alive_secs: 300,
            read_deadline: ReadDeadline::default(),
        }
    }
}

impl ConnectionConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(size) = var("MQFRAME_INPUT_BUFFER").and_then(|v| v.parse().ok()) {
            self.input_buffer_size = size;
        }

        if let Some(size) = var("MQFRAME_OUTPUT_BUFFER").and_then(|v| v.parse().ok()) {
            self.output_buffer_size = size;
        }

        if let Some(secs) = var("MQFRAME_KEEP_ALIVE").and_then(|v| v.parse().ok()) {
            self.keep_alive_secs = secs;
        }

        if let Some(policy) = var("MQFRAME_READ_DEADLINE").and_then(|v| v.parse().ok()) {
            self.read_deadline = policy;
        }
    }

    /// Returns the keep-alive interval as Duration.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "connection.input_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.output_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "connection.output_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter used when RUST_LOG is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(filter) = var("MQFRAME_LOG") {
            self.filter = filter;
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

//! Configuration management for reconchain
//!
//! TOML configuration with defaults and validation.
//! Location: ~/.reconchain/config.toml

use crate::chain::ChainSettings;
use crate::errors::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub events: EventsConfig,
    pub dispatcher: DispatcherConfig,
    pub chain: ChainConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events retained before the oldest is evicted
    pub capacity: usize,
    /// Idle wait before a subscriber heartbeat
    pub heartbeat_ms: u64,
}

/// Batch dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub max_workers: usize,
}

/// Chain engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub max_parallel_nodes: usize,
    pub skip_missing_dependencies: bool,
}

/// Built-in tool wrapper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_sec: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: 5000,
            heartbeat_ms: 2000,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_workers: 10 }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            skip_missing_dependencies: true,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { timeout_sec: 300 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EventsConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

impl From<&ChainConfig> for ChainSettings {
    fn from(config: &ChainConfig) -> Self {
        ChainSettings {
            max_parallel_nodes: config.max_parallel_nodes,
            skip_missing_dependencies: config.skip_missing_dependencies,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, or built-in defaults if absent
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Standard configuration path
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".reconchain").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.events.capacity == 0 {
            return Err(OrchestratorError::ConfigError(
                "events.capacity must be greater than 0".to_string(),
            ));
        }

        if self.events.heartbeat_ms == 0 {
            return Err(OrchestratorError::ConfigError(
                "events.heartbeat_ms must be greater than 0".to_string(),
            ));
        }

        if self.dispatcher.max_workers == 0 {
            return Err(OrchestratorError::ConfigError(
                "dispatcher.max_workers must be greater than 0".to_string(),
            ));
        }

        if self.chain.max_parallel_nodes == 0 {
            return Err(OrchestratorError::ConfigError(
                "chain.max_parallel_nodes must be greater than 0".to_string(),
            ));
        }

        if self.tools.timeout_sec == 0 {
            return Err(OrchestratorError::ConfigError(
                "tools.timeout_sec must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(OrchestratorError::ConfigError(format!(
                    "Invalid log level: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.events.capacity, 5000);
        assert_eq!(config.events.heartbeat(), Duration::from_secs(2));
        assert_eq!(config.dispatcher.max_workers, 10);
        assert!(config.chain.skip_missing_dependencies);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_capacity() {
        let mut config = Config::default();
        config.events.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_workers() {
        let mut config = Config::default();
        config.dispatcher.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatcher]\nmax_workers = 3\n").unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.dispatcher.max_workers, 3);
        assert_eq!(config.events.capacity, 5000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.chain.skip_missing_dependencies = false;
        config.save(&path).unwrap();

        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[events]\ncapacity = 0\n").unwrap();
        assert!(matches!(
            Config::load_from_file(&path),
            Err(OrchestratorError::ConfigError(_))
        ));
    }
}

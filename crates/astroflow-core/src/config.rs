/*!
 * Configuration management for Astroflow.
 *
 * This module provides functionality to load, validate, and access configuration
 * settings for the device protocol handler and its ambient services.
 */
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Core configuration for Astroflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Device protocol handler configuration
    #[serde(default)]
    pub handler: HandlerConfig,

    /// Vendor driver overrides
    #[serde(default)]
    pub drivers: DriversConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application version
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error, `astroflow_devices=debug`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to include the event target in log lines
    #[serde(default = "default_log_target")]
    pub with_target: bool,

    /// Whether to use JSON format for logs
    #[serde(default)]
    pub json_format: bool,
}

/// Device protocol handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Number of times a message for an unknown device is re-queued before it is dropped
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    /// Number of free-text messages kept per device
    #[serde(default = "default_message_log_capacity")]
    pub message_log_capacity: usize,

    /// Interval between reordering queue retries in the reader task, in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Capacity of the inbound message channel feeding the reader task
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

/// Executable name to driver profile overrides
///
/// Profile names are interpreted by the device crate (`"asi"`, `"ioptron-v3"`, `"generic"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriversConfig {
    /// Camera driver executables and their profile
    #[serde(default)]
    pub cameras: HashMap<String, String>,

    /// Mount driver executables and their profile
    #[serde(default)]
    pub mounts: HashMap<String, String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: default_app_version(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: default_log_target(),
            json_format: false,
        }
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: default_retry_ceiling(),
            message_log_capacity: default_message_log_capacity(),
            retry_interval_ms: default_retry_interval_ms(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl HandlerConfig {
    /// Retry interval as a [`Duration`]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }

    /// Check the values for consistency
    pub fn validate(&self) -> Result<()> {
        if self.retry_ceiling == 0 {
            return Err(Error::config("handler.retry_ceiling must be greater than zero"));
        }
        if self.message_log_capacity == 0 {
            return Err(Error::config("handler.message_log_capacity must be greater than zero"));
        }
        if self.inbound_capacity == 0 {
            return Err(Error::config("handler.inbound_capacity must be greater than zero"));
        }
        Ok(())
    }
}

fn default_app_name() -> String {
    "astroflow".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_target() -> bool {
    true
}

fn default_retry_ceiling() -> u32 {
    2048
}

fn default_message_log_capacity() -> usize {
    100
}

fn default_retry_interval_ms() -> u64 {
    10
}

fn default_inbound_capacity() -> usize {
    1024
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            config.handler.validate()?;
            return Ok(config);
        }

        let mut config_builder = ConfigLib::builder();

        // Start with default values
        let default_config = Config::default();
        config_builder = config_builder.add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        config.handler.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }
}

impl Config {
    /// Parse a configuration from a TOML string, filling gaps with defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| Error::config(format!("Invalid TOML configuration: {}", e)))?;
        config.handler.validate()?;
        Ok(config)
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "astroflow");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.handler.retry_ceiling, 2048);
        assert_eq!(config.handler.message_log_capacity, 100);
        assert!(config.drivers.cameras.is_empty());
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.general.app_name, "astroflow");
        assert_eq!(config.handler.retry_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("astroflow.toml");

        {
            let mut file = File::create(&file_path)?;
            file.write_all(
                br#"
                [general]
                environment = "observatory"

                [logging]
                level = "debug"

                [handler]
                retry_ceiling = 16
                message_log_capacity = 5

                [drivers.cameras]
                indi_asi_custom_ccd = "asi"
            "#,
            )?;
        }

        let config = ConfigBuilder::new().with_config_file(&file_path).build()?;

        assert_eq!(config.general.environment, "observatory");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.handler.retry_ceiling, 16);
        assert_eq!(config.handler.message_log_capacity, 5);
        assert_eq!(config.handler.inbound_capacity, 1024);
        assert_eq!(
            config.drivers.cameras.get("indi_asi_custom_ccd").map(String::as_str),
            Some("asi")
        );

        Ok(())
    }

    #[test]
    fn test_config_builder_missing_file_uses_defaults() -> Result<()> {
        let config = ConfigBuilder::new()
            .with_config_file("/nonexistent/astroflow.toml")
            .build()?;
        assert_eq!(config.handler.retry_ceiling, 2048);
        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("ASTROFLOWTEST__GENERAL__APP_NAME", "env-app");
        env::set_var("ASTROFLOWTEST__HANDLER__RETRY_CEILING", "64");

        let config = ConfigBuilder::new()
            .with_environment_prefix("astroflowtest")
            .build()?;

        assert_eq!(config.general.app_name, "env-app");
        assert_eq!(config.handler.retry_ceiling, 64);

        env::remove_var("ASTROFLOWTEST__GENERAL__APP_NAME");
        env::remove_var("ASTROFLOWTEST__HANDLER__RETRY_CEILING");

        Ok(())
    }

    #[test]
    fn test_invalid_handler_config_is_rejected() {
        let result = Config::from_toml_str("[handler]\nretry_ceiling = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_str() -> Result<()> {
        let config = Config::from_toml_str("[drivers.mounts]\nindi_lx200_ioptron = \"ioptron-v3\"\n")?;
        assert_eq!(config.drivers.mounts.len(), 1);
        assert_eq!(config.handler.retry_ceiling, 2048);
        Ok(())
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(Config::default());
        assert_eq!(shared.get().general.app_name, "astroflow");

        let shared2 = shared.clone();
        assert_eq!(shared2.as_ref().handler.message_log_capacity, 100);
    }
}

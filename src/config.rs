//! Configuration loading using Figment
//!
//! Configuration is layered from:
//! 1. `config/iio.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `RUST_IIO_`, nested keys separated by `__`
//!
//! Every section has defaults, so an absent file yields a usable configuration.
//!
//! # Example
//! ```no_run
//! use rust_iio::config::IioConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IioConfig::load()?;
//! config.validate()?;
//! println!("attribute buffer: {} bytes", config.context.attr_buffer_len);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use iio_core::ContextOptions;
use iio_driver_mock::MockConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/iio.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RUST_IIO_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or environment could not be parsed into [`IioConfig`].
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IioConfig {
    /// Log output settings
    pub logging: LoggingConfig,
    /// Object model tuning
    pub context: ContextOptions,
    /// Settings for the in-memory transport
    pub mock: MockConfig,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_format")]
    pub format: String,
    /// Emit span open/close events
    #[serde(default)]
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            span_events: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl IioConfig {
    /// Load configuration from `config/iio.toml` and environment variables
    ///
    /// Example override: `RUST_IIO_LOGGING__LEVEL=debug`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.logging.format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                VALID_FORMATS.join(", ")
            )));
        }

        if self.context.attr_buffer_len == 0 {
            return Err(ConfigError::Invalid(
                "context.attr_buffer_len must be positive".to_string(),
            ));
        }
        if self.context.default_buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "context.default_buffer_capacity must be positive".to_string(),
            ));
        }

        if let Some(i) = self.mock.channel_groups.iter().position(Vec::is_empty) {
            return Err(ConfigError::Invalid(format!(
                "mock.channel_groups[{}] is empty",
                i
            )));
        }

        Ok(())
    }
}

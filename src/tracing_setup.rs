//! Global subscriber installation.
//!
//! The library crates only emit `tracing` events. Applications call [`init`] or
//! [`init_from_config`] once at startup to print them; `RUST_LOG`, when set, takes
//! precedence over the configured level.
//!
//! # Example
//! ```no_run
//! use rust_iio::{config::IioConfig, tracing_setup};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = IioConfig::load()?;
//! tracing_setup::init_from_config(&config)?;
//! tracing::info!(devices = 4, "Context discovered");
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::IioConfig;

/// Failures while building or installing the subscriber.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The level name is not recognized.
    #[error("unknown log level '{0}' (expected trace, debug, info, warn or error)")]
    Level(String),

    /// The format name is not recognized.
    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    Format(String),

    /// A global subscriber could not be installed.
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Line layout of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Multi-line, colored; for terminals.
    #[default]
    Pretty,
    /// One line per event, no color.
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for OutputFormat {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else if s.eq_ignore_ascii_case("compact") {
            Ok(Self::Compact)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(SetupError::Format(s.to_string()))
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Most verbose level printed when `RUST_LOG` is unset.
    pub level: Level,
    /// Event layout.
    pub format: OutputFormat,
    /// Print span creation and close events.
    pub span_events: bool,
    /// Print the source file and line of each event.
    pub source_location: bool,
    /// Colored output; ignored by the compact and JSON formats.
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl TracingConfig {
    /// Defaults at the given level.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::default(),
            span_events: false,
            source_location: true,
            ansi: true,
        }
    }

    /// Settings from the `[logging]` section.
    pub fn from_iio_config(config: &IioConfig) -> Result<Self, SetupError> {
        let level = Level::from_str(&config.logging.level)
            .map_err(|_| SetupError::Level(config.logging.level.clone()))?;
        let mut settings = Self::new(level).with_format(config.logging.format.parse()?);
        settings.span_events = config.logging.span_events;
        Ok(settings)
    }

    /// Set the event layout.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable span open/close events.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Enable or disable colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_span_events(spans)
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_target(true);

        match self.format {
            OutputFormat::Pretty => layer.pretty().with_ansi(self.ansi).boxed(),
            OutputFormat::Compact => layer.compact().with_ansi(false).boxed(),
            OutputFormat::Json => layer.json().with_ansi(false).boxed(),
        }
    }
}

/// Install a subscriber built from the `[logging]` section of `config`.
pub fn init_from_config(config: &IioConfig) -> Result<(), SetupError> {
    init(TracingConfig::from_iio_config(config)?)
}

/// Install a global subscriber.
///
/// Returns `Ok(())` without changes when a global subscriber already exists, so tests
/// and embedding applications may call it more than once.
pub fn init(config: TracingConfig) -> Result<(), SetupError> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let installed = tracing_subscriber::registry()
        .with(config.layer().with_filter(config.filter()))
        .try_init();

    match installed {
        Ok(()) => Ok(()),
        // another thread won the race
        Err(_) if tracing::dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(SetupError::Install(e.to_string())),
    }
}

//! Logging setup
//!
//! The driver only emits `tracing` events and never installs a subscriber on
//! its own. Applications without one can pass the `[logging]` table of their
//! [`DriverConfig`](crate::DriverConfig) to [`setup_logging`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{SoundError, SoundResult};

/// The `[logging]` table of the driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Lowest level emitted unless `RUST_LOG` says otherwise
    pub level: String,
    /// One JSON object per event instead of the human-readable format
    pub json: bool,
    /// Include source file and line
    pub file_info: bool,
    /// Also emit span enter/exit events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Log at `level`, e.g. `"debug"` for the per-call driver traces
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// The configured level, parsed
    pub fn level(&self) -> SoundResult<Level> {
        parse_log_level(&self.level)
    }
}

/// Install a global subscriber built from `config`.
///
/// `RUST_LOG` directives are honoured on top of the configured level.
/// Fails with a configuration error if a global subscriber is already
/// installed.
pub fn setup_logging(config: &LoggingConfig) -> SoundResult<()> {
    let level = config.level()?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| SoundError::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(level = %level, "Sound driver logging enabled, v{}", crate::VERSION);
    Ok(())
}

/// Parse a log level such as `"warn"` or `"DEBUG"`
pub fn parse_log_level(level: &str) -> SoundResult<Level> {
    Level::from_str(level.trim())
        .map_err(|_| SoundError::config(format!("Invalid log level: {}", level)))
}

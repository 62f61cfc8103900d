//! Driver configuration
//!
//! All fields have defaults, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! session_mode = "self_managed"
//! max_frames_per_slice = 4096
//! silence_first_playback = true
//!
//! [device]
//! name = "Voice Processing Sound Device"
//! default_sample_rate = 44100
//!
//! [latency]
//! default_rec_ms = 100
//! default_play_ms = 140
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SoundError, SoundResult};
use crate::logging::LoggingConfig;

/// How the platform audio session is managed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// The driver sets the category and activates the session itself
    SelfManaged,
    /// The application does, through the session callbacks
    Delegated,
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Delegated
    }
}

/// Description of the single virtual device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub default_sample_rate: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Voice Processing Sound Device".to_string(),
            default_sample_rate: 44100,
        }
    }
}

/// Latency values `set_latency` falls back to when given zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub default_rec_ms: u32,
    pub default_play_ms: u32,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            default_rec_ms: 100,
            default_play_ms: 140,
        }
    }
}

/// Sound driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub session_mode: SessionMode,
    pub device: DeviceConfig,
    pub latency: LatencyConfig,
    /// Largest capture callback, in hardware frames, served without allocating
    pub max_frames_per_slice: u32,
    /// Zero the first playback buffer after every start
    pub silence_first_playback: bool,
    /// Subscriber settings for [`setup_logging`](crate::setup_logging)
    pub logging: LoggingConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::default(),
            device: DeviceConfig::default(),
            latency: LatencyConfig::default(),
            max_frames_per_slice: 4096,
            silence_first_playback: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> SoundResult<Self> {
        let config: DriverConfig = toml::from_str(source)
            .map_err(|e| SoundError::config(format!("Invalid driver configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Use the given session mode
    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    /// Set the capture scratch capacity
    pub fn with_max_frames_per_slice(mut self, frames: u32) -> Self {
        self.max_frames_per_slice = frames;
        self
    }

    /// Enable or disable the first-buffer silence
    pub fn with_silence_first_playback(mut self, enable: bool) -> Self {
        self.silence_first_playback = enable;
        self
    }

    pub fn validate(&self) -> SoundResult<()> {
        if self.max_frames_per_slice == 0 {
            return Err(SoundError::config("max_frames_per_slice must be greater than zero"));
        }
        if self.device.name.trim().is_empty() {
            return Err(SoundError::config("device name must not be empty"));
        }
        self.logging.level()?;
        Ok(())
    }
}

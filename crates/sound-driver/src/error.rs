//! Error types for the sound driver
//!
//! Control-path operations (`init`, `open`, `start`, ...) return [`SoundError`].
//! The real-time render path never builds one: it reports through the
//! allocation-free [`RenderError`] instead.

use thiserror::Error;

use crate::platform::OsStatus;

/// Result type for sound driver operations
pub type SoundResult<T> = Result<T, SoundError>;

/// Result type returned to the hardware runtime by the render callbacks
pub type RenderResult = Result<(), RenderError>;

/// Host status code for an invalid argument
pub const STATUS_EINVAL: i32 = 70004;

/// Host status code for an object that is busy
pub const STATUS_EBUSY: i32 = 70011;

/// Host status code for an operation invalid in the current state
pub const STATUS_EINVALIDOP: i32 = 70013;

/// Errors that can occur while driving the sound device
#[derive(Debug, Error)]
pub enum SoundError {
    /// `open` was called before `init` (or after `deinit`)
    #[error("Sound driver is not initialized")]
    NotInitialized,

    /// Only 16-bit samples are supported
    #[error("Unsupported bits per sample: {bits} (only 16 is supported)")]
    UnsupportedBitsPerSample { bits: u32 },

    /// Only mono and stereo streams are supported
    #[error("Unsupported channel count: {channels} (expected 1 or 2)")]
    UnsupportedChannelCount { channels: u32 },

    /// A packet must hold at least one whole frame
    #[error("Invalid samples per frame: {samples_per_frame}")]
    InvalidSamplesPerFrame { samples_per_frame: u32 },

    /// Neither a capture nor a playback device was requested
    #[error("No direction: rec_id={rec_id} play_id={play_id}")]
    NoDirection { rec_id: i32, play_id: i32 },

    /// The requested direction needs a callback that was not supplied
    #[error("Missing {side} callback for the requested direction")]
    MissingCallback { side: &'static str },

    /// Another stream is currently active
    #[error("Another sound stream (id {stream_id}) is active")]
    StreamBusy { stream_id: u64 },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The voice-processing component could not be located
    #[error("Unable to find voice processing audio component")]
    ComponentNotFound,

    /// The hardware unit could not be instantiated
    #[error("Unable to instantiate voice unit: {0}")]
    Instantiate(OsStatus),

    /// Enabling the input element failed
    #[error("Failed to enable voice unit input: {0}")]
    EnableInput(OsStatus),

    /// Enabling the output element failed
    #[error("Failed to enable voice unit output: {0}")]
    EnableOutput(OsStatus),

    /// Setting the input element's client format failed
    #[error("Failed to set client input bus stream format: {0}")]
    InputFormat(OsStatus),

    /// Initializing the hardware unit failed
    #[error("Failed to initialize voice unit: {0}")]
    Initialize(OsStatus),

    /// Setting the output element's client format failed
    #[error("Failed to set client output bus stream format: {0}")]
    OutputFormat(OsStatus),

    /// Installing the playback render callback failed
    #[error("Failed to set output bus render callback: {0}")]
    RenderCallback(OsStatus),

    /// Installing the capture input callback failed
    #[error("Failed to set input callback: {0}")]
    InputCallback(OsStatus),

    /// The hardware unit refused to start
    #[error("Failed to start voice unit: {0}")]
    Start(OsStatus),
}

impl SoundError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Status code reported to the telephony stack.
    ///
    /// Each platform setup step keeps its own negative code so a caller can
    /// tell which step of `open` failed.
    pub fn status_code(&self) -> i32 {
        match self {
            SoundError::NotInitialized => STATUS_EINVALIDOP,
            SoundError::UnsupportedBitsPerSample { .. }
            | SoundError::UnsupportedChannelCount { .. }
            | SoundError::InvalidSamplesPerFrame { .. }
            | SoundError::NoDirection { .. }
            | SoundError::MissingCallback { .. }
            | SoundError::Config { .. } => STATUS_EINVAL,
            SoundError::StreamBusy { .. } => STATUS_EBUSY,
            SoundError::ComponentNotFound | SoundError::Instantiate(_) => -1,
            SoundError::EnableInput(_) => -2,
            SoundError::EnableOutput(_) => -3,
            SoundError::InputFormat(_) => -4,
            SoundError::Initialize(_) => -5,
            SoundError::OutputFormat(_) => -6,
            SoundError::RenderCallback(_) => -7,
            SoundError::InputCallback(_) => -8,
            SoundError::Start(_) => -9,
        }
    }

    /// Whether the error was raised before any platform call was made
    pub fn is_configuration_error(&self) -> bool {
        self.status_code() > 0
    }
}

/// Failure inside a real-time render callback.
///
/// `Copy` and string-free so that reporting it never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The hardware refused to render captured frames
    #[error("hardware render failed: {0}")]
    Render(OsStatus),

    /// The hardware delivered more frames than the preallocated scratch holds
    #[error("capture of {frames} frames exceeds scratch capacity of {capacity} frames")]
    ScratchOverflow { frames: u32, capacity: u32 },

    /// The stream behind the callback has been closed
    #[error("stream closed")]
    StreamClosed,

    /// The stream path was held by another thread
    #[error("stream path busy")]
    PathBusy,
}

impl RenderError {
    /// Status handed back to the hardware runtime
    pub fn status(&self) -> OsStatus {
        match self {
            RenderError::Render(status) => *status,
            _ => OsStatus::GENERIC_FAILURE,
        }
    }
}

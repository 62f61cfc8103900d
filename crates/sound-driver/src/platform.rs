//! Hardware capability layer
//!
//! The native audio API is reached only through the traits in this module:
//!
//! - [`AudioPlatform`] locates the voice-processing component, manages the
//!   platform audio session and reports the hardware I/O buffer duration.
//! - [`VoiceComponent`] instantiates hardware units.
//! - [`VoiceUnit`] is one instantiated hardware unit: enable-io, stream
//!   format, initialize, callback installation, start/stop and render.
//!
//! A platform backend implements these traits over its native API; the
//! [`crate::mock`] module implements them in memory for tests.

use std::fmt;
use std::sync::Arc;

use crate::bridge::RenderBridge;
use crate::types::{HARDWARE_BYTES_PER_FRAME, SessionCategory};

/// Platform status code, as returned by the native audio API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsStatus(pub i32);

impl OsStatus {
    /// Success
    pub const NO_ERR: OsStatus = OsStatus(0);

    /// Generic failure reported back to the hardware runtime
    pub const GENERIC_FAILURE: OsStatus = OsStatus(-1);

    /// Whether the status denotes success
    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Platform codes are frequently four-character codes
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(
                f,
                "{} '{}{}{}{}'",
                self.0, bytes[0] as char, bytes[1] as char, bytes[2] as char, bytes[3] as char
            )
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Result of a platform call
pub type PlatformResult<T> = Result<T, OsStatus>;

/// Hardware unit element (bus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// Output element, bus 0 (speaker)
    Output,
    /// Input element, bus 1 (microphone)
    Input,
}

impl Element {
    /// Bus number of the element
    pub fn bus(&self) -> u32 {
        match self {
            Element::Output => 0,
            Element::Input => 1,
        }
    }
}

/// Client-side stream format set on the hardware unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub bits_per_channel: u32,
    pub channels_per_frame: u32,
    pub bytes_per_frame: u32,
    pub frames_per_packet: u32,
    pub bytes_per_packet: u32,
}

impl StreamFormat {
    /// Canonical interleaved signed 16-bit stereo linear PCM
    pub fn stereo_pcm16(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            bits_per_channel: 16,
            channels_per_frame: 2,
            bytes_per_frame: HARDWARE_BYTES_PER_FRAME as u32,
            frames_per_packet: 1,
            bytes_per_packet: HARDWARE_BYTES_PER_FRAME as u32,
        }
    }
}

/// Hardware timestamp handed to the capture callback and passed through to
/// [`VoiceUnit::render`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioTimestamp {
    pub sample_time: f64,
    pub host_time: u64,
}

/// One instantiated hardware voice-processing unit.
///
/// `start`/`stop` may be called from the control thread or from the
/// interruption notifier; `render` is called from the capture real-time
/// thread inside the input callback.
pub trait VoiceUnit: Send + Sync {
    /// Enable I/O on one element
    fn enable_io(&self, element: Element) -> PlatformResult<()>;

    /// Set the client-side stream format of one element
    fn set_stream_format(&self, element: Element, format: &StreamFormat) -> PlatformResult<()>;

    /// Allocate hardware resources
    fn initialize(&self) -> PlatformResult<()>;

    /// Install the playback (output element) render callback
    fn set_render_callback(&self, bridge: Arc<RenderBridge>) -> PlatformResult<()>;

    /// Install the capture (input element) callback
    fn set_input_callback(&self, bridge: Arc<RenderBridge>) -> PlatformResult<()>;

    /// Start the hardware I/O threads
    fn start(&self) -> PlatformResult<()>;

    /// Stop the hardware I/O threads
    fn stop(&self) -> PlatformResult<()>;

    /// Render `frame_count` captured frames of stereo 16-bit PCM into `data`.
    ///
    /// `data` is exactly `frame_count * 4` bytes long.
    fn render(
        &self,
        timestamp: &AudioTimestamp,
        element: Element,
        frame_count: u32,
        data: &mut [u8],
    ) -> PlatformResult<()>;

    /// Release the hardware resources acquired by `initialize`
    fn uninitialize(&self) -> PlatformResult<()>;

    /// Dispose of the unit instance
    fn dispose(&self) -> PlatformResult<()>;
}

/// A located voice-processing component able to create hardware units
pub trait VoiceComponent: Send + Sync {
    /// Create a new hardware unit
    fn instantiate(&self) -> PlatformResult<Arc<dyn VoiceUnit>>;
}

/// Entry point to the platform's audio facilities
pub trait AudioPlatform: Send + Sync {
    /// Locate the hardware voice-processing component
    fn find_voice_processing_component(&self) -> Option<Arc<dyn VoiceComponent>>;

    /// Current hardware I/O buffer duration in seconds
    fn io_buffer_duration(&self) -> f32;

    /// Initialize the platform audio session and register for interruptions
    fn initialize_session(&self) -> PlatformResult<()>;

    /// Set the audio session category
    fn set_session_category(&self, category: SessionCategory) -> PlatformResult<()>;

    /// Activate or deactivate the audio session
    fn set_session_active(&self, active: bool) -> PlatformResult<()>;
}

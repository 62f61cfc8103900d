//! Core types shared across the driver
//!
//! Stream configuration, stream direction and the fixed device/stream
//! information records reported to the telephony stack.

use crate::error::{SoundError, SoundResult};

/// Device index meaning "the default device"
pub const DEFAULT_DEVICE: i32 = -1;

/// Device index meaning "no device on this side"
pub const NO_DEVICE: i32 = -2;

/// The only supported sample width
pub const SUPPORTED_BITS_PER_SAMPLE: u32 = 16;

/// Bytes in one 16-bit sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bytes in one frame of the hardware's stereo 16-bit format
pub const HARDWARE_BYTES_PER_FRAME: usize = 4;

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Capture only (microphone)
    Capture,
    /// Playback only (speaker)
    Playback,
    /// Full duplex
    CaptureAndPlayback,
}

impl Direction {
    /// Derive the direction from the requested device indices.
    ///
    /// [`DEFAULT_DEVICE`] counts as index 0; any other negative index means
    /// the side is not wanted.
    pub fn from_ids(rec_id: i32, play_id: i32) -> Option<Self> {
        let normalize = |id: i32| if id == DEFAULT_DEVICE { 0 } else { id };
        match (normalize(rec_id) >= 0, normalize(play_id) >= 0) {
            (true, true) => Some(Direction::CaptureAndPlayback),
            (true, false) => Some(Direction::Capture),
            (false, true) => Some(Direction::Playback),
            (false, false) => None,
        }
    }

    /// Whether the capture side is enabled
    pub fn has_capture(&self) -> bool {
        matches!(self, Direction::Capture | Direction::CaptureAndPlayback)
    }

    /// Whether the playback side is enabled
    pub fn has_playback(&self) -> bool {
        matches!(self, Direction::Playback | Direction::CaptureAndPlayback)
    }

    /// Session category the platform should use while this direction runs
    pub fn session_category(&self) -> SessionCategory {
        match self {
            Direction::Capture => SessionCategory::RecordAudio,
            Direction::Playback => SessionCategory::MediaPlayback,
            Direction::CaptureAndPlayback => SessionCategory::PlayAndRecord,
        }
    }
}

/// Platform audio session category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCategory {
    /// Input only
    RecordAudio,
    /// Output only
    MediaPlayback,
    /// Simultaneous input and output
    PlayAndRecord,
}

/// Channel layout of the telephony side of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Mono,
    Stereo,
}

impl Channels {
    /// Parse a raw channel count
    pub fn from_count(count: u32) -> SoundResult<Self> {
        match count {
            1 => Ok(Channels::Mono),
            2 => Ok(Channels::Stereo),
            other => Err(SoundError::UnsupportedChannelCount { channels: other }),
        }
    }

    /// Number of channels
    pub fn count(&self) -> u32 {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Immutable configuration of one open stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub direction: Direction,
    pub clock_rate: u32,
    pub channels: Channels,
    pub samples_per_frame: u32,
    pub bits_per_sample: u32,
}

impl StreamConfig {
    /// Validate and build a stream configuration
    pub fn new(
        direction: Direction,
        clock_rate: u32,
        channel_count: u32,
        samples_per_frame: u32,
        bits_per_sample: u32,
    ) -> SoundResult<Self> {
        if bits_per_sample != SUPPORTED_BITS_PER_SAMPLE {
            return Err(SoundError::UnsupportedBitsPerSample {
                bits: bits_per_sample,
            });
        }
        let channels = Channels::from_count(channel_count)?;
        // Stereo packets hold whole interleaved frames
        if samples_per_frame == 0 || samples_per_frame % channels.count() != 0 {
            return Err(SoundError::InvalidSamplesPerFrame { samples_per_frame });
        }

        Ok(Self {
            direction,
            clock_rate,
            channels,
            samples_per_frame,
            bits_per_sample,
        })
    }

    /// Bytes exchanged with the telephony stack per callback
    pub fn packet_size(&self) -> usize {
        self.samples_per_frame as usize * self.bits_per_sample as usize / 8
    }

    /// Frames held by one packet
    pub fn frames_per_packet(&self) -> u32 {
        (self.packet_size() / (BYTES_PER_SAMPLE * self.channels.count() as usize)) as u32
    }
}

/// Information about the (single, virtual) sound device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub input_count: u32,
    pub output_count: u32,
    pub default_sample_rate: u32,
}

/// Information about an open stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_id: u64,
    pub direction: Direction,
    pub rec_id: i32,
    pub play_id: i32,
    pub clock_rate: u32,
    pub channel_count: u32,
    pub samples_per_frame: u32,
    pub bits_per_sample: u32,
    /// Capture latency in samples
    pub rec_latency: u32,
    /// Playback latency in samples
    pub play_latency: u32,
}

/// Latency preferences in milliseconds, as last set through `set_latency`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub input_ms: u32,
    pub output_ms: u32,
}

//! Telephony stack interface
//!
//! What the driver consumes from the media stack: the per-stream record and
//! play callbacks, and the thread registrar used to introduce the hardware's
//! real-time threads to the stack's threading model.

use thiserror::Error;

use crate::types::Direction;

/// Receives captured audio, one full packet at a time
pub trait RecordCallback: Send {
    /// `input` holds exactly one packet of 16-bit PCM; `timestamp` is in samples
    fn on_record(&mut self, timestamp: u32, input: &[u8]);
}

/// Produces audio to play, one full packet at a time
pub trait PlayCallback: Send {
    /// Fill all of `output` (exactly one packet) with 16-bit PCM
    fn on_play(&mut self, timestamp: u32, output: &mut [u8]);
}

impl<F> RecordCallback for F
where
    F: FnMut(u32, &[u8]) + Send,
{
    fn on_record(&mut self, timestamp: u32, input: &[u8]) {
        self(timestamp, input)
    }
}

impl<F> PlayCallback for F
where
    F: FnMut(u32, &mut [u8]) + Send,
{
    fn on_play(&mut self, timestamp: u32, output: &mut [u8]) {
        self(timestamp, output)
    }
}

/// The callbacks of one stream.
///
/// Half-duplex streams carry only the callback their direction needs, so a
/// capture-only stream cannot be handed a play callback by accident.
pub enum StreamCallbacks {
    Capture {
        record: Box<dyn RecordCallback>,
    },
    Playback {
        play: Box<dyn PlayCallback>,
    },
    Duplex {
        record: Box<dyn RecordCallback>,
        play: Box<dyn PlayCallback>,
    },
}

impl StreamCallbacks {
    /// Capture-only callbacks
    pub fn capture(record: impl RecordCallback + 'static) -> Self {
        StreamCallbacks::Capture {
            record: Box::new(record),
        }
    }

    /// Playback-only callbacks
    pub fn playback(play: impl PlayCallback + 'static) -> Self {
        StreamCallbacks::Playback {
            play: Box::new(play),
        }
    }

    /// Full-duplex callbacks
    pub fn duplex(record: impl RecordCallback + 'static, play: impl PlayCallback + 'static) -> Self {
        StreamCallbacks::Duplex {
            record: Box::new(record),
            play: Box::new(play),
        }
    }

    /// Direction these callbacks can serve
    pub fn direction(&self) -> Direction {
        match self {
            StreamCallbacks::Capture { .. } => Direction::Capture,
            StreamCallbacks::Playback { .. } => Direction::Playback,
            StreamCallbacks::Duplex { .. } => Direction::CaptureAndPlayback,
        }
    }

    /// Split into the optional record and play halves
    pub fn into_parts(self) -> (Option<Box<dyn RecordCallback>>, Option<Box<dyn PlayCallback>>) {
        match self {
            StreamCallbacks::Capture { record } => (Some(record), None),
            StreamCallbacks::Playback { play } => (None, Some(play)),
            StreamCallbacks::Duplex { record, play } => (Some(record), Some(play)),
        }
    }
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("direction", &self.direction())
            .finish()
    }
}

/// Thread registration failure reported by the host stack
#[derive(Debug, Clone, Error)]
#[error("thread registration failed: {reason}")]
pub struct HostError {
    pub reason: String,
}

impl HostError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The media stack's cooperative threading model.
///
/// Threads created outside the stack must be registered before they call
/// back into it. Both methods are invoked on the thread in question.
pub trait ThreadRegistrar: Send + Sync {
    /// Whether the calling thread is already known to the stack
    fn is_thread_registered(&self) -> bool;

    /// Register the calling thread under `name`
    fn register_thread(&self, name: &str) -> Result<(), HostError>;
}

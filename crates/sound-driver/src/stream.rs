//! Per-stream state
//!
//! A [`StreamState`] is created by `open` and lives until `close`. It owns the
//! hardware unit, the playback and capture paths, and the activity flags.
//!
//! Each path is touched by exactly one real-time thread while the unit runs,
//! so its mutex is only ever acquired with `try_lock` on that thread and never
//! contends. The control thread reads a path only while the unit is stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::host::{PlayCallback, RecordCallback};
use crate::platform::{PlatformResult, VoiceUnit};
use crate::reshaper::{CaptureBuffer, PlaybackBuffer};
use crate::types::{HARDWARE_BYTES_PER_FRAME, StreamConfig};

/// Playback path: reshaping buffer plus the telephony play callback
pub struct PlaybackPath {
    pub buffer: PlaybackBuffer,
    pub callback: Box<dyn PlayCallback>,
}

/// Capture path: reshaping buffer, hardware scratch and the record callback
pub struct CapturePath {
    pub buffer: CaptureBuffer,
    /// Stereo 16-bit render target, sized once at open
    pub scratch: Box<[u8]>,
    pub callback: Box<dyn RecordCallback>,
}

impl CapturePath {
    /// Scratch capacity in hardware frames
    pub fn scratch_frames(&self) -> u32 {
        (self.scratch.len() / HARDWARE_BYTES_PER_FRAME) as u32
    }
}

/// State of one open stream
pub struct StreamState {
    id: u64,
    config: StreamConfig,
    rec_id: i32,
    play_id: i32,
    unit: Arc<dyn VoiceUnit>,
    playback: Option<Mutex<PlaybackPath>>,
    capture: Option<Mutex<CapturePath>>,
    /// Between start and stop
    active: AtomicBool,
    /// Whether the hardware unit is currently started
    running: AtomicBool,
    /// Set by `close` before the unit is torn down; never cleared
    closed: AtomicBool,
    /// One-shot: silence the first playback buffer after start
    silence_next_playback: AtomicBool,
}

impl StreamState {
    pub(crate) fn new(
        id: u64,
        config: StreamConfig,
        rec_id: i32,
        play_id: i32,
        unit: Arc<dyn VoiceUnit>,
        record: Option<Box<dyn RecordCallback>>,
        play: Option<Box<dyn PlayCallback>>,
        max_frames_per_slice: u32,
    ) -> Self {
        let playback = play.map(|callback| {
            Mutex::new(PlaybackPath {
                buffer: PlaybackBuffer::new(&config),
                callback,
            })
        });
        let capture = record.map(|callback| {
            Mutex::new(CapturePath {
                buffer: CaptureBuffer::new(&config),
                scratch: vec![0u8; max_frames_per_slice as usize * HARDWARE_BYTES_PER_FRAME]
                    .into_boxed_slice(),
                callback,
            })
        });

        Self {
            id,
            config,
            rec_id,
            play_id,
            unit,
            playback,
            capture,
            active: AtomicBool::new(false),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            silence_next_playback: AtomicBool::new(false),
        }
    }

    /// Stream identifier used in logs
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn rec_id(&self) -> i32 {
        self.rec_id
    }

    pub fn play_id(&self) -> i32 {
        self.play_id
    }

    pub(crate) fn unit(&self) -> &dyn VoiceUnit {
        self.unit.as_ref()
    }

    pub(crate) fn playback(&self) -> Option<&Mutex<PlaybackPath>> {
        self.playback.as_ref()
    }

    pub(crate) fn capture(&self) -> Option<&Mutex<CapturePath>> {
        self.capture.as_ref()
    }

    /// Whether the stream is between start and stop
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    /// Whether the hardware unit is started
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn arm_playback_silence(&self) {
        self.silence_next_playback.store(true, Ordering::Release);
    }

    /// Consume the one-shot silence flag
    pub(crate) fn take_playback_silence(&self) -> bool {
        self.silence_next_playback.load(Ordering::Relaxed)
            && self.silence_next_playback.swap(false, Ordering::AcqRel)
    }

    /// Whether `close` has begun tearing the stream down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Start the hardware unit unless it is already running.
    ///
    /// Returns `Ok(false)` when nothing was done: the unit is already running
    /// or the stream is closed, in which case the unit may be disposed.
    pub(crate) fn start_unit(&self) -> PlatformResult<bool> {
        if self.is_closed() {
            debug!(stream_id = self.id, "Stream closed, voice unit not started");
            return Ok(false);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            debug!(stream_id = self.id, "Voice unit already running");
            return Ok(false);
        }
        if let Err(status) = self.unit.start() {
            self.running.store(false, Ordering::Release);
            return Err(status);
        }
        Ok(true)
    }

    /// Stop the hardware unit unless it is already stopped
    pub(crate) fn stop_unit(&self) -> bool {
        if !self.running.swap(false, Ordering::AcqRel) {
            debug!(stream_id = self.id, "Voice unit already stopped");
            return false;
        }
        if let Err(status) = self.unit.stop() {
            error!(stream_id = self.id, "Failed to stop voice unit: {}", status);
        }
        true
    }

    /// Bytes of playback data carried over to the next hardware request
    pub fn playback_leftover(&self) -> Option<usize> {
        self.playback
            .as_ref()
            .and_then(|p| p.try_lock().map(|p| p.buffer.leftover()))
    }

    /// Bytes of the capture packet filled so far
    pub fn capture_offset(&self) -> Option<usize> {
        self.capture
            .as_ref()
            .and_then(|c| c.try_lock().map(|c| c.buffer.offset()))
    }
}

impl std::fmt::Debug for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamState")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("active", &self.is_active())
            .field("running", &self.is_running())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPlatform, PlatformCall};
    use crate::platform::{AudioPlatform, OsStatus, VoiceComponent};
    use crate::types::{Direction, NO_DEVICE};

    fn state(platform: &MockPlatform) -> StreamState {
        let unit = platform
            .find_voice_processing_component()
            .unwrap()
            .instantiate()
            .unwrap();
        let config = StreamConfig::new(Direction::Playback, 8000, 1, 160, 16).unwrap();
        StreamState::new(
            3,
            config,
            NO_DEVICE,
            0,
            unit,
            None,
            Some(Box::new(|_: u32, out: &mut [u8]| out.fill(0))),
            64,
        )
    }

    #[test]
    fn unit_start_and_stop_follow_transitions() {
        let platform = MockPlatform::new();
        let state = state(&platform);

        assert_eq!(state.start_unit(), Ok(true));
        assert_eq!(state.start_unit(), Ok(false));
        assert!(state.stop_unit());
        assert!(!state.stop_unit());
        assert_eq!(platform.count(PlatformCall::Start), 1);
        assert_eq!(platform.count(PlatformCall::Stop), 1);
    }

    #[test]
    fn failed_start_leaves_unit_stopped() {
        let platform = MockPlatform::new();
        let state = state(&platform);
        platform.fail_on(PlatformCall::Start, OsStatus(-66635));

        assert_eq!(state.start_unit(), Err(OsStatus(-66635)));
        assert!(!state.is_running());

        platform.clear_failure(PlatformCall::Start);
        assert_eq!(state.start_unit(), Ok(true));
    }

    #[test]
    fn closed_stream_never_restarts_unit() {
        let platform = MockPlatform::new();
        let state = state(&platform);

        state.mark_closed();
        assert_eq!(state.start_unit(), Ok(false));
        assert!(!state.is_running());
        assert_eq!(platform.count(PlatformCall::Start), 0);
    }
}

//! Real-time render bridge
//!
//! The two entry points the hardware unit calls on its real-time threads:
//!
//! - [`RenderBridge::on_playback_needed`]: the output element wants `N` bytes
//!   of stereo 16-bit audio.
//! - [`RenderBridge::on_capture_available`]: the input element has captured
//!   `frame_count` frames, fetched here with [`VoiceUnit::render`].
//!
//! In steady state neither entry point allocates, blocks or panics. The
//! stream path is taken with `try_lock`; a contended path means the control
//! thread is touching the stream, in which case playback emits silence and
//! capture is skipped. The exception is the first callback of each direction
//! after a start: registering the thread with the telephony stack records it
//! in the [`ThreadRegistry`], which may lock a map shard and allocate.

use std::sync::{Arc, Weak};

use tracing::{error, trace, warn};

use crate::error::{RenderError, RenderResult};
use crate::host::ThreadRegistrar;
use crate::platform::{AudioTimestamp, Element, VoiceUnit};
use crate::registry::{IoRole, ThreadRegistry};
use crate::stream::StreamState;
use crate::types::HARDWARE_BYTES_PER_FRAME;

/// Connects one stream's hardware callbacks to its reshaping buffers
pub struct RenderBridge {
    stream: Weak<StreamState>,
    threads: Arc<ThreadRegistry>,
    registrar: Arc<dyn ThreadRegistrar>,
}

impl RenderBridge {
    pub(crate) fn new(
        stream: Weak<StreamState>,
        threads: Arc<ThreadRegistry>,
        registrar: Arc<dyn ThreadRegistrar>,
    ) -> Self {
        Self {
            stream,
            threads,
            registrar,
        }
    }

    /// Output element render callback: fill all of `dest` with interleaved
    /// stereo 16-bit PCM.
    pub fn on_playback_needed(&self, dest: &mut [u8]) -> RenderResult {
        self.threads
            .ensure_registered(IoRole::Playback, self.registrar.as_ref());

        let Some(stream) = self.stream.upgrade() else {
            dest.fill(0);
            return Err(RenderError::StreamClosed);
        };
        let Some(path) = stream.playback() else {
            dest.fill(0);
            return Ok(());
        };
        let Some(mut path) = path.try_lock() else {
            warn!(stream_id = stream.id(), "Playback path busy, emitting silence");
            dest.fill(0);
            return Err(RenderError::PathBusy);
        };

        let path = &mut *path;
        let produced = path.buffer.fill(dest, path.callback.as_mut());
        trace!(
            stream_id = stream.id(),
            bytes = dest.len(),
            produced,
            "Playback render"
        );

        if stream.take_playback_silence() {
            // The first packet after start tends to carry an audible pop
            dest.fill(0);
        }
        Ok(())
    }

    /// Input element callback: render `frame_count` captured frames from
    /// `unit` and feed them to the capture buffer.
    ///
    /// On a render failure nothing is delivered to the telephony stack.
    pub fn on_capture_available(
        &self,
        unit: &dyn VoiceUnit,
        timestamp: &AudioTimestamp,
        frame_count: u32,
    ) -> RenderResult {
        self.threads
            .ensure_registered(IoRole::Capture, self.registrar.as_ref());

        let Some(stream) = self.stream.upgrade() else {
            return Err(RenderError::StreamClosed);
        };
        let Some(path) = stream.capture() else {
            return Ok(());
        };
        let Some(mut path) = path.try_lock() else {
            warn!(stream_id = stream.id(), "Capture path busy, dropping input");
            return Err(RenderError::PathBusy);
        };

        let capacity = path.scratch_frames();
        if frame_count > capacity {
            error!(
                stream_id = stream.id(),
                "Capture of {} frames exceeds scratch capacity of {} frames", frame_count, capacity
            );
            return Err(RenderError::ScratchOverflow {
                frames: frame_count,
                capacity,
            });
        }

        let path = &mut *path;
        let bytes = frame_count as usize * HARDWARE_BYTES_PER_FRAME;
        let scratch = &mut path.scratch[..bytes];
        if let Err(status) = unit.render(timestamp, Element::Input, frame_count, scratch) {
            error!(stream_id = stream.id(), "Voice unit render error: {}", status);
            return Err(RenderError::Render(status));
        }

        let delivered = path.buffer.consume(scratch, path.callback.as_mut());
        trace!(
            stream_id = stream.id(),
            frames = frame_count,
            delivered,
            "Capture render"
        );
        Ok(())
    }
}

impl std::fmt::Debug for RenderBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBridge")
            .field("stream", &self.stream.upgrade().map(|s| s.id()))
            .finish()
    }
}

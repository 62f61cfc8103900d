//! Sound driver life cycle
//!
//! [`SoundDriver`] is the surface the telephony stack talks to:
//!
//! ```text
//! new ─▶ init ─▶ open ─▶ start ⇄ stop ─▶ close ─▶ (open ...) ─▶ deinit
//!                 │                        ▲
//!                 └──── SoundStream ───────┘
//! ```
//!
//! `init` resolves the hardware voice-processing component once; every `open`
//! instantiates a hardware unit from it, configures it and wires the render
//! bridge into it. Only one stream can be active at a time: the driver keeps
//! it in an [`ActiveStreamSlot`] so interruption notifications can reach it.
//!
//! `start`, `stop`, `close` and the interruption notifications run under one
//! control lock, so an interruption never restarts a unit that a concurrent
//! `stop` or `close` has just released. The lock is reentrant: a session
//! delegate may call `stop` or `close` from inside its `start_session`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::bridge::RenderBridge;
use crate::config::{DriverConfig, SessionMode};
use crate::error::{SoundError, SoundResult};
use crate::host::{PlayCallback, RecordCallback, StreamCallbacks, ThreadRegistrar};
use crate::platform::{AudioPlatform, Element, StreamFormat, VoiceComponent, VoiceUnit};
use crate::registry::{ActiveStreamSlot, ThreadRegistry};
use crate::session::{AudioSessionDelegate, Interruption, SessionController};
use crate::stream::StreamState;
use crate::types::{DeviceInfo, Direction, Latency, NO_DEVICE, StreamConfig, StreamInfo};

/// Parameters of [`SoundDriver::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenParams {
    /// Capture device index, [`crate::DEFAULT_DEVICE`] or [`NO_DEVICE`]
    pub rec_id: i32,
    /// Playback device index, [`crate::DEFAULT_DEVICE`] or [`NO_DEVICE`]
    pub play_id: i32,
    pub clock_rate: u32,
    pub channel_count: u32,
    pub samples_per_frame: u32,
    pub bits_per_sample: u32,
}

impl OpenParams {
    pub fn new(
        rec_id: i32,
        play_id: i32,
        clock_rate: u32,
        channel_count: u32,
        samples_per_frame: u32,
        bits_per_sample: u32,
    ) -> Self {
        Self {
            rec_id,
            play_id,
            clock_rate,
            channel_count,
            samples_per_frame,
            bits_per_sample,
        }
    }
}

/// Handle to an open stream.
///
/// Closing consumes the handle, so a closed stream cannot be started again.
#[derive(Debug)]
pub struct SoundStream {
    state: Arc<StreamState>,
}

impl SoundStream {
    /// Stream identifier used in logs
    pub fn id(&self) -> u64 {
        self.state.id()
    }

    /// Per-stream state
    pub fn state(&self) -> &Arc<StreamState> {
        &self.state
    }

    /// Whether the stream is between start and stop
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// The sound device driver
pub struct SoundDriver {
    config: DriverConfig,
    platform: Arc<dyn AudioPlatform>,
    component: RwLock<Option<Arc<dyn VoiceComponent>>>,
    registrar: RwLock<Option<Arc<dyn ThreadRegistrar>>>,
    latency: RwLock<Latency>,
    active_stream: Arc<ActiveStreamSlot>,
    threads: Arc<ThreadRegistry>,
    session: SessionController,
    /// Serializes stream state transitions against interruptions
    control: ReentrantMutex<()>,
    next_stream_id: AtomicU64,
}

impl SoundDriver {
    /// Create a driver over `platform`. Nothing is touched until `init`.
    pub fn new(config: DriverConfig, platform: Arc<dyn AudioPlatform>) -> SoundResult<Self> {
        config.validate()?;

        let active_stream = Arc::new(ActiveStreamSlot::new());
        let threads = Arc::new(ThreadRegistry::new());
        let session = SessionController::new(
            config.session_mode,
            platform.clone(),
            active_stream.clone(),
            threads.clone(),
        );
        let latency = Latency {
            input_ms: config.latency.default_rec_ms,
            output_ms: config.latency.default_play_ms,
        };

        Ok(Self {
            config,
            platform,
            component: RwLock::new(None),
            registrar: RwLock::new(None),
            latency: RwLock::new(latency),
            active_stream,
            threads,
            session,
            control: ReentrantMutex::new(()),
            next_stream_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Resolve the hardware voice-processing component.
    ///
    /// `registrar` is the telephony stack's thread registration service,
    /// used by every stream opened until `deinit`.
    pub fn init(&self, registrar: Arc<dyn ThreadRegistrar>) -> SoundResult<()> {
        debug!("Sound driver init");
        *self.registrar.write() = Some(registrar);
        self.session.initialize();

        let Some(component) = self.platform.find_voice_processing_component() else {
            error!("Unable to find voice processing audio component");
            return Err(SoundError::ComponentNotFound);
        };
        *self.component.write() = Some(component);
        Ok(())
    }

    /// Drop the cached component and registrar
    pub fn deinit(&self) -> SoundResult<()> {
        debug!("Sound driver deinit");
        *self.component.write() = None;
        *self.registrar.write() = None;
        Ok(())
    }

    /// Whether `init` succeeded and `deinit` has not been called since
    pub fn is_initialized(&self) -> bool {
        self.component.read().is_some()
    }

    /// Number of devices: always one virtual device
    pub fn device_count(&self) -> usize {
        debug!("Sound driver device count");
        1
    }

    /// Information about the virtual device; `index` is ignored
    pub fn device_info(&self, index: usize) -> DeviceInfo {
        debug!(index, "Sound driver device info");
        DeviceInfo {
            name: self.config.device.name.clone(),
            input_count: 1,
            output_count: 1,
            default_sample_rate: self.config.device.default_sample_rate,
        }
    }

    /// Open a capture-only stream
    pub fn open_rec(
        &self,
        index: i32,
        clock_rate: u32,
        channel_count: u32,
        samples_per_frame: u32,
        bits_per_sample: u32,
        record: impl RecordCallback + 'static,
    ) -> SoundResult<SoundStream> {
        debug!("Sound driver open_rec");
        self.open(
            OpenParams::new(index, NO_DEVICE, clock_rate, channel_count, samples_per_frame, bits_per_sample),
            StreamCallbacks::capture(record),
        )
    }

    /// Open a playback-only stream
    pub fn open_player(
        &self,
        index: i32,
        clock_rate: u32,
        channel_count: u32,
        samples_per_frame: u32,
        bits_per_sample: u32,
        play: impl PlayCallback + 'static,
    ) -> SoundResult<SoundStream> {
        debug!("Sound driver open_player");
        self.open(
            OpenParams::new(NO_DEVICE, index, clock_rate, channel_count, samples_per_frame, bits_per_sample),
            StreamCallbacks::playback(play),
        )
    }

    /// Open a stream and configure a hardware unit for it.
    ///
    /// Nothing platform-side happens until the parameters are validated. If
    /// a setup step fails, the unit created for the stream is torn down
    /// before the error is returned.
    pub fn open(&self, params: OpenParams, callbacks: StreamCallbacks) -> SoundResult<SoundStream> {
        debug!("Sound driver open: started");
        info!(
            clock_rate = params.clock_rate,
            channel_count = params.channel_count,
            samples_per_frame = params.samples_per_frame,
            bits_per_sample = params.bits_per_sample,
            "Opening sound stream"
        );

        let component = self.component.read().clone().ok_or(SoundError::NotInitialized)?;
        let registrar = self.registrar.read().clone().ok_or(SoundError::NotInitialized)?;

        let direction = Direction::from_ids(params.rec_id, params.play_id).ok_or(
            SoundError::NoDirection {
                rec_id: params.rec_id,
                play_id: params.play_id,
            },
        )?;
        let config = StreamConfig::new(
            direction,
            params.clock_rate,
            params.channel_count,
            params.samples_per_frame,
            params.bits_per_sample,
        )?;

        let (record, play) = callbacks.into_parts();
        if direction.has_capture() && record.is_none() {
            return Err(SoundError::MissingCallback { side: "record" });
        }
        if direction.has_playback() && play.is_none() {
            return Err(SoundError::MissingCallback { side: "play" });
        }
        if let Some(current) = self.active_stream.active() {
            return Err(SoundError::StreamBusy {
                stream_id: current.id(),
            });
        }

        let unit = component.instantiate().map_err(|status| {
            error!("Unable to instantiate voice unit: {}", status);
            SoundError::Instantiate(status)
        })?;

        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(StreamState::new(
            id,
            config,
            params.rec_id,
            params.play_id,
            unit.clone(),
            record.filter(|_| direction.has_capture()),
            play.filter(|_| direction.has_playback()),
            self.config.max_frames_per_slice,
        ));
        let bridge = Arc::new(RenderBridge::new(
            Arc::downgrade(&state),
            self.threads.clone(),
            registrar,
        ));

        let mut initialized = false;
        if let Err(e) = self.configure_unit(&state, unit.as_ref(), bridge, &mut initialized) {
            error!(stream_id = id, "{}", e);
            teardown_unit(id, unit.as_ref(), initialized);
            return Err(e);
        }

        if let Some(previous) = self.active_stream.set(state.clone()) {
            warn!(
                stream_id = id,
                previous = previous.id(),
                "Replacing interruptible stream"
            );
        }
        debug!(stream_id = id, "Sound driver open: finished");
        Ok(SoundStream { state })
    }

    /// Configure a freshly instantiated unit.
    ///
    /// The unit must be initialized after the input element's format is set
    /// and before the output element's format is; initializing in any other
    /// order silently disables voice processing on some platforms.
    fn configure_unit(
        &self,
        state: &StreamState,
        unit: &dyn VoiceUnit,
        bridge: Arc<RenderBridge>,
        initialized: &mut bool,
    ) -> SoundResult<()> {
        let direction = state.config().direction;
        let format = StreamFormat::stereo_pcm16(state.config().clock_rate);

        if direction.has_capture() {
            unit.enable_io(Element::Input).map_err(SoundError::EnableInput)?;
        }
        if direction.has_playback() {
            unit.enable_io(Element::Output).map_err(SoundError::EnableOutput)?;
        }
        if direction.has_capture() {
            unit.set_stream_format(Element::Input, &format)
                .map_err(SoundError::InputFormat)?;
        }

        self.session.start_session(direction);

        unit.initialize().map_err(SoundError::Initialize)?;
        *initialized = true;

        if direction.has_playback() {
            unit.set_stream_format(Element::Output, &format)
                .map_err(SoundError::OutputFormat)?;
            unit.set_render_callback(bridge.clone())
                .map_err(SoundError::RenderCallback)?;
        }
        if direction.has_capture() {
            unit.set_input_callback(bridge)
                .map_err(SoundError::InputCallback)?;
        }
        Ok(())
    }

    /// Start the stream: activate the session and the hardware unit.
    ///
    /// If the hardware unit refuses to start, the session is deactivated
    /// again and the stream is left stopped.
    pub fn start(&self, stream: &SoundStream) -> SoundResult<()> {
        let _control = self.control.lock();
        let state = &stream.state;
        debug!(stream_id = state.id(), "Sound stream start");

        if let Some(current) = self.active_stream.active() {
            if !Arc::ptr_eq(&current, state) {
                return Err(SoundError::StreamBusy {
                    stream_id: current.id(),
                });
            }
        }
        if state.is_active() {
            warn!(stream_id = state.id(), "Sound stream already started");
            return Ok(());
        }

        self.active_stream.set(state.clone());
        state.set_active(true);
        self.session.start_session(state.config().direction);
        if !state.is_active() {
            debug!(stream_id = state.id(), "Sound stream stopped while activating session");
            return Ok(());
        }
        if self.config.silence_first_playback {
            state.arm_playback_silence();
        }
        if let Err(status) = state.start_unit() {
            error!(stream_id = state.id(), "Failed to start voice unit: {}", status);
            state.set_active(false);
            self.session.stop_session();
            return Err(SoundError::Start(status));
        }
        Ok(())
    }

    /// Information about an open stream
    pub fn stream_info(&self, stream: &SoundStream) -> StreamInfo {
        let state = &stream.state;
        let config = state.config();
        debug!(stream_id = state.id(), "Sound stream info");

        let buffer_duration = self.platform.io_buffer_duration();
        let latency = (buffer_duration * config.clock_rate as f32 * config.channels.count() as f32) as u32;
        debug!(stream_id = state.id(), rec_latency = latency, play_latency = latency, "Sound stream latency");

        StreamInfo {
            stream_id: state.id(),
            direction: config.direction,
            rec_id: state.rec_id(),
            play_id: state.play_id(),
            clock_rate: config.clock_rate,
            channel_count: config.channels.count(),
            samples_per_frame: config.samples_per_frame,
            bits_per_sample: config.bits_per_sample,
            rec_latency: latency,
            play_latency: latency,
        }
    }

    /// Stop the stream. Stopping a stream that is not started does nothing.
    pub fn stop(&self, stream: &SoundStream) -> SoundResult<()> {
        let _control = self.control.lock();
        let state = &stream.state;
        debug!(stream_id = state.id(), "Sound stream stop");

        if !state.set_active(false) {
            warn!(stream_id = state.id(), "Sound stream already stopped");
            return Ok(());
        }
        self.halt(state);
        Ok(())
    }

    /// Close the stream and release its hardware unit
    pub fn close(&self, stream: SoundStream) -> SoundResult<()> {
        let _control = self.control.lock();
        let state = stream.state;
        debug!(stream_id = state.id(), "Sound stream close");

        if state.set_active(false) {
            warn!(stream_id = state.id(), "Closing a started stream, stopping it first");
            self.halt(&state);
        }

        state.mark_closed();
        debug!(stream_id = state.id(), "Shutting down voice unit");
        teardown_unit(state.id(), state.unit(), true);
        self.active_stream.clear_if(&state);
        Ok(())
    }

    /// Stop the unit of a stream just marked inactive
    fn halt(&self, state: &StreamState) {
        state.stop_unit();
        self.threads.clear();
        self.session.stop_session();
    }

    /// Store latency preferences; zero selects the configured default.
    ///
    /// The values are kept for reporting only and do not affect buffering.
    pub fn set_latency(&self, input_ms: u32, output_ms: u32) -> SoundResult<()> {
        let latency = Latency {
            input_ms: if input_ms == 0 {
                self.config.latency.default_rec_ms
            } else {
                input_ms
            },
            output_ms: if output_ms == 0 {
                self.config.latency.default_play_ms
            } else {
                output_ms
            },
        };
        debug!(input_ms = latency.input_ms, output_ms = latency.output_ms, "Sound driver set latency");
        *self.latency.write() = latency;
        Ok(())
    }

    /// Latency preferences last stored by `set_latency`
    pub fn latency(&self) -> Latency {
        *self.latency.read()
    }

    /// Install (or remove) the delegated session callbacks.
    ///
    /// Ignored when the driver manages the session itself.
    pub fn set_audio_session_callbacks(&self, delegate: Option<Arc<dyn AudioSessionDelegate>>) {
        self.session.set_delegate(delegate);
    }

    pub fn session_mode(&self) -> SessionMode {
        self.session.mode()
    }

    /// The platform session was interrupted
    pub fn notify_interruption_begin(&self) {
        let _control = self.control.lock();
        self.session.handle_interruption(Interruption::Begin);
    }

    /// The platform session interruption is over
    pub fn notify_interruption_end(&self) {
        let _control = self.control.lock();
        self.session.handle_interruption(Interruption::End);
    }

    /// Stream interruptions currently apply to
    pub fn active_stream(&self) -> Option<Arc<StreamState>> {
        self.active_stream.get()
    }

    /// Real-time thread registration memo shared by all streams
    pub fn thread_registry(&self) -> &Arc<ThreadRegistry> {
        &self.threads
    }
}

impl std::fmt::Debug for SoundDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundDriver")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("session", &self.session)
            .finish()
    }
}

fn teardown_unit(stream_id: u64, unit: &dyn VoiceUnit, initialized: bool) {
    if initialized {
        if let Err(status) = unit.uninitialize() {
            error!(stream_id, "Failed to uninitialize voice unit: {}", status);
        }
    }
    if let Err(status) = unit.dispose() {
        error!(stream_id, "Failed to dispose voice unit: {}", status);
    }
}

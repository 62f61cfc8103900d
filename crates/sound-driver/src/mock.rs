//! Memory-backed platform for integration testing
//!
//! [`MockPlatform`] implements the hardware capability traits without any
//! audio hardware. It records every platform call in order, can be told to
//! fail any call with a given status, and lets a test play the role of the
//! hardware's real-time threads through [`MockVoiceUnit::pull_playback`] and
//! [`MockVoiceUnit::push_capture`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::bridge::RenderBridge;
use crate::error::RenderResult;
use crate::host::{HostError, ThreadRegistrar};
use crate::platform::{
    AudioPlatform, AudioTimestamp, Element, OsStatus, PlatformResult, StreamFormat, VoiceComponent,
    VoiceUnit,
};
use crate::session::AudioSessionDelegate;
use crate::types::{HARDWARE_BYTES_PER_FRAME, SessionCategory};

/// A call made into the mock platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformCall {
    FindComponent,
    Instantiate,
    EnableIo(Element),
    SetStreamFormat(Element),
    Initialize,
    SetRenderCallback,
    SetInputCallback,
    Start,
    Stop,
    Render,
    Uninitialize,
    Dispose,
    InitializeSession,
    SetSessionCategory(SessionCategory),
    SetSessionActive(bool),
}

struct MockShared {
    calls: Mutex<Vec<PlatformCall>>,
    failures: Mutex<HashMap<PlatformCall, OsStatus>>,
    component_available: AtomicBool,
    io_buffer_duration: Mutex<f32>,
    units: Mutex<Vec<Arc<MockVoiceUnit>>>,
}

impl MockShared {
    fn record(&self, call: PlatformCall) -> PlatformResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().get(&call) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MockShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockShared")
            .field("calls", &self.calls.lock().len())
            .field("units", &self.units.lock().len())
            .finish()
    }
}

/// In-memory [`AudioPlatform`]
#[derive(Debug, Clone)]
pub struct MockPlatform {
    shared: Arc<MockShared>,
}

impl MockPlatform {
    /// A platform with a voice-processing component and a 20 ms I/O buffer
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                component_available: AtomicBool::new(true),
                io_buffer_duration: Mutex::new(0.02),
                units: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A platform on which the voice-processing component cannot be found
    pub fn without_component() -> Self {
        let platform = Self::new();
        platform
            .shared
            .component_available
            .store(false, Ordering::SeqCst);
        platform
    }

    /// Make every future `call` fail with `status`
    pub fn fail_on(&self, call: PlatformCall, status: OsStatus) {
        self.shared.failures.lock().insert(call, status);
    }

    /// Stop failing `call`
    pub fn clear_failure(&self, call: PlatformCall) {
        self.shared.failures.lock().remove(&call);
    }

    pub fn set_io_buffer_duration(&self, seconds: f32) {
        *self.shared.io_buffer_duration.lock() = seconds;
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.shared.calls.lock().clone()
    }

    /// Number of times `call` was made
    pub fn count(&self, call: PlatformCall) -> usize {
        self.shared.calls.lock().iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.shared.calls.lock().clear();
    }

    /// All units instantiated so far
    pub fn units(&self) -> Vec<Arc<MockVoiceUnit>> {
        self.shared.units.lock().clone()
    }

    /// Most recently instantiated unit
    pub fn last_unit(&self) -> Option<Arc<MockVoiceUnit>> {
        self.shared.units.lock().last().cloned()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlatform for MockPlatform {
    fn find_voice_processing_component(&self) -> Option<Arc<dyn VoiceComponent>> {
        let _ = self.shared.record(PlatformCall::FindComponent);
        if !self.shared.component_available.load(Ordering::SeqCst) {
            return None;
        }
        Some(Arc::new(MockComponent {
            shared: self.shared.clone(),
        }))
    }

    fn io_buffer_duration(&self) -> f32 {
        *self.shared.io_buffer_duration.lock()
    }

    fn initialize_session(&self) -> PlatformResult<()> {
        self.shared.record(PlatformCall::InitializeSession)
    }

    fn set_session_category(&self, category: SessionCategory) -> PlatformResult<()> {
        self.shared.record(PlatformCall::SetSessionCategory(category))
    }

    fn set_session_active(&self, active: bool) -> PlatformResult<()> {
        self.shared.record(PlatformCall::SetSessionActive(active))
    }
}

#[derive(Debug)]
struct MockComponent {
    shared: Arc<MockShared>,
}

impl VoiceComponent for MockComponent {
    fn instantiate(&self) -> PlatformResult<Arc<dyn VoiceUnit>> {
        self.shared.record(PlatformCall::Instantiate)?;
        let unit = Arc::new(MockVoiceUnit {
            shared: self.shared.clone(),
            formats: Mutex::new(HashMap::new()),
            render_bridge: Mutex::new(None),
            input_bridge: Mutex::new(None),
            captured: Mutex::new(VecDeque::new()),
            sample_time: Mutex::new(0.0),
            running: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        self.shared.units.lock().push(unit.clone());
        Ok(unit)
    }
}

/// In-memory [`VoiceUnit`] driven by the test in place of hardware threads
#[derive(Debug)]
pub struct MockVoiceUnit {
    shared: Arc<MockShared>,
    formats: Mutex<HashMap<Element, StreamFormat>>,
    render_bridge: Mutex<Option<Arc<RenderBridge>>>,
    input_bridge: Mutex<Option<Arc<RenderBridge>>>,
    /// Stereo bytes waiting to be handed out by `render`
    captured: Mutex<VecDeque<u8>>,
    sample_time: Mutex<f64>,
    running: AtomicBool,
    disposed: AtomicBool,
}

impl MockVoiceUnit {
    /// Play the output thread: ask the render callback for `bytes` bytes.
    ///
    /// Returns `None` when no render callback is installed.
    pub fn pull_playback(&self, bytes: usize) -> Option<(Vec<u8>, RenderResult)> {
        let bridge = self.render_bridge.lock().clone()?;
        let mut dest = vec![0xa5u8; bytes];
        let result = bridge.on_playback_needed(&mut dest);
        Some((dest, result))
    }

    /// Play the input thread: make `stereo` available and invoke the input
    /// callback for the number of frames it holds.
    ///
    /// Returns `None` when no input callback is installed.
    pub fn push_capture(&self, stereo: &[u8]) -> Option<RenderResult> {
        let bridge = self.input_bridge.lock().clone()?;
        self.captured.lock().extend(stereo.iter().copied());

        let frames = (stereo.len() / HARDWARE_BYTES_PER_FRAME) as u32;
        let timestamp = {
            let mut sample_time = self.sample_time.lock();
            let timestamp = AudioTimestamp {
                sample_time: *sample_time,
                host_time: 0,
            };
            *sample_time += frames as f64;
            timestamp
        };
        Some(bridge.on_capture_available(self, &timestamp, frames))
    }

    /// Client format last set on `element`
    pub fn stream_format(&self, element: Element) -> Option<StreamFormat> {
        self.formats.lock().get(&element).copied()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn has_render_callback(&self) -> bool {
        self.render_bridge.lock().is_some()
    }

    pub fn has_input_callback(&self) -> bool {
        self.input_bridge.lock().is_some()
    }
}

impl VoiceUnit for MockVoiceUnit {
    fn enable_io(&self, element: Element) -> PlatformResult<()> {
        self.shared.record(PlatformCall::EnableIo(element))
    }

    fn set_stream_format(&self, element: Element, format: &StreamFormat) -> PlatformResult<()> {
        self.shared.record(PlatformCall::SetStreamFormat(element))?;
        self.formats.lock().insert(element, *format);
        Ok(())
    }

    fn initialize(&self) -> PlatformResult<()> {
        self.shared.record(PlatformCall::Initialize)
    }

    fn set_render_callback(&self, bridge: Arc<RenderBridge>) -> PlatformResult<()> {
        self.shared.record(PlatformCall::SetRenderCallback)?;
        *self.render_bridge.lock() = Some(bridge);
        Ok(())
    }

    fn set_input_callback(&self, bridge: Arc<RenderBridge>) -> PlatformResult<()> {
        self.shared.record(PlatformCall::SetInputCallback)?;
        *self.input_bridge.lock() = Some(bridge);
        Ok(())
    }

    fn start(&self) -> PlatformResult<()> {
        self.shared.record(PlatformCall::Start)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> PlatformResult<()> {
        self.shared.record(PlatformCall::Stop)?;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn render(
        &self,
        _timestamp: &AudioTimestamp,
        _element: Element,
        _frame_count: u32,
        data: &mut [u8],
    ) -> PlatformResult<()> {
        let result = self.shared.record(PlatformCall::Render);
        let mut captured = self.captured.lock();
        let available = captured.len().min(data.len());
        for (dst, src) in data.iter_mut().zip(captured.drain(..available)) {
            *dst = src;
        }
        data[available..].fill(0);
        result
    }

    fn uninitialize(&self) -> PlatformResult<()> {
        self.shared.record(PlatformCall::Uninitialize)
    }

    fn dispose(&self) -> PlatformResult<()> {
        self.shared.record(PlatformCall::Dispose)?;
        self.disposed.store(true, Ordering::SeqCst);
        self.render_bridge.lock().take();
        self.input_bridge.lock().take();
        Ok(())
    }
}

/// In-memory telephony thread registrar
#[derive(Debug, Default)]
pub struct MockHost {
    registered: Mutex<HashSet<ThreadId>>,
    registrations: AtomicUsize,
    fail: AtomicBool,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make registration attempts fail
    pub fn fail_registrations(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Successful and failed registration attempts so far
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Treat the calling thread as unknown again
    pub fn forget_current_thread(&self) {
        self.registered.lock().remove(&thread::current().id());
    }
}

impl ThreadRegistrar for MockHost {
    fn is_thread_registered(&self) -> bool {
        self.registered.lock().contains(&thread::current().id())
    }

    fn register_thread(&self, name: &str) -> Result<(), HostError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostError::new(format!("cannot register {}", name)));
        }
        self.registered.lock().insert(thread::current().id());
        Ok(())
    }
}

/// Session delegate counting what it is asked to do
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    starts: Mutex<Vec<SessionCategory>>,
    stops: AtomicUsize,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Categories passed to `start_session`, in order
    pub fn starts(&self) -> Vec<SessionCategory> {
        self.starts.lock().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioSessionDelegate for RecordingDelegate {
    fn start_session(&self, category: SessionCategory) {
        self.starts.lock().push(category);
    }

    fn stop_session(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

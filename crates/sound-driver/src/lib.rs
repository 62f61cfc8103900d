//! # Voxbridge Sound Driver
//!
//! A sound device driver that connects a telephony media stack to a hardware
//! voice-processing unit (echo cancellation, gain control, noise suppression).
//!
//! The media stack works in fixed-size packets of mono 16-bit PCM. The
//! hardware unit works in real-time callbacks of arbitrary length carrying
//! interleaved stereo 16-bit PCM. This crate bridges the two:
//!
//! - **Frame reshaping**: packets are spread over, or gathered from, hardware
//!   buffers of any size, converting mono to stereo and back.
//! - **Real-time bridge**: the hardware callbacks register their threads with
//!   the media stack, then never allocate or block.
//! - **Session control**: the platform audio session is activated per stream,
//!   either by the driver or by the application, and interruptions stop and
//!   restart the active stream.
//! - **Life cycle**: init, open, start, stop, close, deinit.
//!
//! The hardware is reached through the [`AudioPlatform`], [`VoiceComponent`]
//! and [`VoiceUnit`] traits. The [`mock`] module implements them in memory.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use voxbridge_sound_driver::mock::{MockHost, MockPlatform};
//! use voxbridge_sound_driver::{DEFAULT_DEVICE, DriverConfig, SoundDriver};
//!
//! let platform = MockPlatform::new();
//! let driver = SoundDriver::new(DriverConfig::default(), Arc::new(platform.clone()))?;
//! driver.init(Arc::new(MockHost::new()))?;
//!
//! // 20 ms of 8 kHz mono audio per packet
//! let stream = driver.open_player(DEFAULT_DEVICE, 8000, 1, 160, 16, |_ts: u32, out: &mut [u8]| {
//!     out.fill(0);
//! })?;
//! driver.start(&stream)?;
//! driver.stop(&stream)?;
//! driver.close(stream)?;
//! driver.deinit()?;
//! # Ok::<(), voxbridge_sound_driver::SoundError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod logging;
pub mod mock;
pub mod platform;
pub mod registry;
pub mod reshaper;
pub mod session;
pub mod stream;
pub mod types;

pub use bridge::RenderBridge;
pub use config::{DeviceConfig, DriverConfig, LatencyConfig, SessionMode};
pub use driver::{OpenParams, SoundDriver, SoundStream};
pub use error::{RenderError, RenderResult, SoundError, SoundResult};
pub use host::{HostError, PlayCallback, RecordCallback, StreamCallbacks, ThreadRegistrar};
pub use logging::{LoggingConfig, parse_log_level, setup_logging};
pub use platform::{
    AudioPlatform, AudioTimestamp, Element, OsStatus, PlatformResult, StreamFormat, VoiceComponent,
    VoiceUnit,
};
pub use registry::{ActiveStreamSlot, IoRole, ThreadRegistry};
pub use reshaper::{CaptureBuffer, PlaybackBuffer};
pub use session::{AudioSessionDelegate, Interruption, SessionController};
pub use stream::StreamState;
pub use types::{
    Channels, DEFAULT_DEVICE, DeviceInfo, Direction, Latency, NO_DEVICE, SessionCategory,
    StreamConfig, StreamInfo,
};

/// Version of the sound driver crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

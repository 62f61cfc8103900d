//! Audio session control and interruption recovery
//!
//! The platform audio session is activated around a stream's lifetime in one
//! of two modes, fixed by [`SessionMode`] when the driver is built:
//!
//! - **self-managed**: the driver sets the category and toggles the session
//!   through [`AudioPlatform`] itself.
//! - **delegated**: the application owns the session; the driver only calls
//!   the [`AudioSessionDelegate`] it was given.
//!
//! Interruptions (another audio client taking over) stop the active stream's
//! hardware unit; the end of the interruption restarts it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::SessionMode;
use crate::platform::AudioPlatform;
use crate::registry::{ActiveStreamSlot, ThreadRegistry};
use crate::types::{Direction, SessionCategory};

/// Application hooks for delegated session management.
///
/// Both members are optional; the defaults do nothing.
pub trait AudioSessionDelegate: Send + Sync {
    /// Activate the session with the given category
    fn start_session(&self, _category: SessionCategory) {}

    /// Deactivate the session
    fn stop_session(&self) {}
}

/// Interruption notification from the platform session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Begin,
    End,
}

/// Activates the platform session and recovers from interruptions
pub struct SessionController {
    mode: SessionMode,
    platform: Arc<dyn AudioPlatform>,
    delegate: RwLock<Option<Arc<dyn AudioSessionDelegate>>>,
    initialized: AtomicBool,
    active_stream: Arc<ActiveStreamSlot>,
    threads: Arc<ThreadRegistry>,
}

impl SessionController {
    pub fn new(
        mode: SessionMode,
        platform: Arc<dyn AudioPlatform>,
        active_stream: Arc<ActiveStreamSlot>,
        threads: Arc<ThreadRegistry>,
    ) -> Self {
        Self {
            mode,
            platform,
            delegate: RwLock::new(None),
            initialized: AtomicBool::new(false),
            active_stream,
            threads,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Initialize the platform session once (self-managed mode only)
    pub fn initialize(&self) {
        if self.mode != SessionMode::SelfManaged {
            return;
        }
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Initializing audio session");
        if let Err(status) = self.platform.initialize_session() {
            error!("Audio session initialization failed: {}", status);
            self.initialized.store(false, Ordering::Release);
        }
    }

    /// Install the delegate used in delegated mode
    pub fn set_delegate(&self, delegate: Option<Arc<dyn AudioSessionDelegate>>) {
        if self.mode != SessionMode::Delegated {
            warn!("Audio session callbacks ignored: session is self-managed");
            return;
        }
        *self.delegate.write() = delegate;
    }

    /// The delegate is called without the slot lock held, so it may call
    /// back into the driver.
    fn delegate(&self) -> Option<Arc<dyn AudioSessionDelegate>> {
        self.delegate.read().clone()
    }

    /// Activate the session for `direction`
    pub fn start_session(&self, direction: Direction) {
        let category = direction.session_category();
        match self.mode {
            SessionMode::SelfManaged => {
                if let Err(status) = self.platform.set_session_category(category) {
                    error!("Failed to set audio session category {:?}: {}", category, status);
                }
                if let Err(status) = self.platform.set_session_active(true) {
                    error!("Failed to activate audio session: {}", status);
                }
            }
            SessionMode::Delegated => {
                if let Some(delegate) = self.delegate() {
                    delegate.start_session(category);
                }
            }
        }
    }

    /// Deactivate the session
    pub fn stop_session(&self) {
        match self.mode {
            SessionMode::SelfManaged => {
                if let Err(status) = self.platform.set_session_active(false) {
                    error!("Failed to deactivate audio session: {}", status);
                }
            }
            SessionMode::Delegated => {
                if let Some(delegate) = self.delegate() {
                    delegate.stop_session();
                }
            }
        }
    }

    /// Handle an interruption notification
    pub fn handle_interruption(&self, state: Interruption) {
        match state {
            Interruption::Begin => self.begin_interruption(),
            Interruption::End => self.end_interruption(),
        }
    }

    /// Stop the active stream's hardware unit; the session is already gone
    pub fn begin_interruption(&self) {
        info!("Audio session interruption began");
        if let Some(stream) = self.active_stream.active() {
            stream.stop_unit();
            self.threads.clear();
        }
    }

    /// Reactivate the session and restart the active stream, if any.
    ///
    /// A session delegate may stop or close the stream from inside
    /// `start_session`, so the stream is checked again before the unit is
    /// restarted.
    pub fn end_interruption(&self) {
        info!("Audio session interruption ended");
        let Some(stream) = self.active_stream.active() else {
            return;
        };
        self.start_session(stream.config().direction);

        if !stream.is_active() || stream.is_closed() {
            debug!(stream_id = stream.id(), "Stream stopped during interruption recovery");
            return;
        }
        if let Err(status) = stream.start_unit() {
            error!(stream_id = stream.id(), "Failed to restart voice unit: {}", status);
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("mode", &self.mode)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .field("has_delegate", &self.delegate.read().is_some())
            .finish()
    }
}

//! Driver-wide registries
//!
//! - [`ThreadRegistry`] memoizes which real-time threads have been registered
//!   with the telephony stack.
//! - [`ActiveStreamSlot`] holds the one stream that interruptions act upon.
//!
//! Both are owned by a [`crate::SoundDriver`] instance rather than being
//! process globals, so independent drivers (and tests) never share them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::host::ThreadRegistrar;
use crate::stream::StreamState;

/// Which hardware callback a real-time thread services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoRole {
    Capture,
    Playback,
}

impl IoRole {
    fn thread_name(&self) -> &'static str {
        match self {
            IoRole::Capture => "voice-unit-input",
            IoRole::Playback => "voice-unit-output",
        }
    }
}

/// Memo of real-time threads known to the telephony stack.
///
/// The per-role flag is the lock-free fast path checked on every callback.
/// The identity map is consulted only when the flag is clear, which happens
/// once per role after each start or interruption.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    capture_registered: AtomicBool,
    playback_registered: AtomicBool,
    known: DashMap<ThreadId, IoRole>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, role: IoRole) -> &AtomicBool {
        match role {
            IoRole::Capture => &self.capture_registered,
            IoRole::Playback => &self.playback_registered,
        }
    }

    /// Whether the thread servicing `role` is known to be registered
    pub fn is_registered(&self, role: IoRole) -> bool {
        self.flag(role).load(Ordering::Acquire)
    }

    /// Number of distinct thread identities currently remembered
    pub fn known_threads(&self) -> usize {
        self.known.len()
    }

    /// Make sure the calling thread is registered with the telephony stack.
    ///
    /// Failure is logged and leaves the flag clear, so the next callback
    /// tries again; audio keeps flowing either way.
    ///
    /// Once the role's flag is set this is a single atomic load. The first
    /// call for a role after every start or interruption is not real-time
    /// safe: recording the thread identity takes a map shard lock and may
    /// allocate.
    pub fn ensure_registered(&self, role: IoRole, registrar: &dyn ThreadRegistrar) {
        let flag = self.flag(role);
        if flag.load(Ordering::Acquire) {
            return;
        }

        let id = thread::current().id();
        if !self.known.contains_key(&id) {
            if registrar.is_thread_registered() {
                debug!("Voice unit {:?} thread already registered", role);
            } else {
                debug!("Voice unit {:?} created a separate thread", role);
                if let Err(e) = registrar.register_thread(role.thread_name()) {
                    error!("Voice unit {:?} thread failed to register: {}", role, e);
                    return;
                }
            }
            self.known.insert(id, role);
        }
        flag.store(true, Ordering::Release);
    }

    /// Forget every registration.
    ///
    /// Called whenever the hardware unit stops: the platform may tear its
    /// real-time threads down and create new ones on the next start.
    pub fn clear(&self) {
        self.capture_registered.store(false, Ordering::Release);
        self.playback_registered.store(false, Ordering::Release);
        self.known.clear();
    }
}

/// Single-slot registry of the stream interruptions apply to
#[derive(Debug, Default)]
pub struct ActiveStreamSlot {
    slot: RwLock<Option<Arc<StreamState>>>,
}

impl ActiveStreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stream, if any
    pub fn get(&self) -> Option<Arc<StreamState>> {
        self.slot.read().clone()
    }

    /// Current stream if it is between start and stop
    pub fn active(&self) -> Option<Arc<StreamState>> {
        self.slot.read().as_ref().filter(|s| s.is_active()).cloned()
    }

    /// Replace the slot content, returning the previous stream
    pub fn set(&self, stream: Arc<StreamState>) -> Option<Arc<StreamState>> {
        self.slot.write().replace(stream)
    }

    /// Empty the slot if it still refers to `stream`
    pub fn clear_if(&self, stream: &Arc<StreamState>) -> bool {
        let mut slot = self.slot.write();
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, stream) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }
}

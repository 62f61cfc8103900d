//! Shared fixtures for the sound driver integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use voxbridge_sound_driver::mock::{MockHost, MockPlatform};
use voxbridge_sound_driver::{DriverConfig, SessionMode, SoundDriver};

/// A driver over a mock platform, already initialized
pub struct Harness {
    pub platform: MockPlatform,
    pub host: Arc<MockHost>,
    pub driver: SoundDriver,
}

pub fn harness(config: DriverConfig) -> Harness {
    let platform = MockPlatform::new();
    let host = Arc::new(MockHost::new());
    let driver = SoundDriver::new(config, Arc::new(platform.clone())).unwrap();
    driver.init(host.clone()).unwrap();
    platform.clear_calls();
    Harness {
        platform,
        host,
        driver,
    }
}

/// Self-managed session, first-buffer silence disabled
pub fn plain_config() -> DriverConfig {
    DriverConfig::default()
        .with_session_mode(SessionMode::SelfManaged)
        .with_silence_first_playback(false)
}

pub type Recorded = Arc<Mutex<Vec<(u32, Vec<u8>)>>>;

/// Record callback keeping every delivered packet
pub fn recorder() -> (impl FnMut(u32, &[u8]) + Send + 'static, Recorded) {
    let packets: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = packets.clone();
    let record = move |ts: u32, input: &[u8]| sink.lock().push((ts, input.to_vec()));
    (record, packets)
}

/// Play callback emitting a running 16-bit counter, one sample after another
pub fn counting_player() -> (impl FnMut(u32, &mut [u8]) + Send + 'static, Arc<Mutex<Vec<u32>>>) {
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let seen = stamps.clone();
    let mut next: i16 = 1;
    let play = move |ts: u32, out: &mut [u8]| {
        seen.lock().push(ts);
        for chunk in out.chunks_exact_mut(2) {
            chunk.copy_from_slice(&next.to_ne_bytes());
            next = next.wrapping_add(1);
        }
    };
    (play, stamps)
}

pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
}

pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect()
}

/// `frames` stereo frames with left = frame index and right = its negation
pub fn stereo_ramp(start: i16, frames: usize) -> Vec<u8> {
    let samples: Vec<i16> = (0..frames as i16)
        .flat_map(|i| [start + i, -(start + i)])
        .collect();
    samples_to_bytes(&samples)
}

//! Frame reshaping between telephony packets and hardware buffers
//!
//! The telephony stack exchanges fixed-size packets of 16-bit PCM (mono in
//! practice) while the hardware asks for, or delivers, an arbitrary number of
//! interleaved stereo frames per callback. The two buffers here absorb the
//! size mismatch and perform the channel conversion:
//!
//! ```text
//!  playback:  on_play ──▶ [packet | offset] ──dup L/R──▶ hardware (N bytes)
//!  capture:   hardware ──drop R──▶ [packet | offset] ──full──▶ on_record
//! ```
//!
//! Neither buffer allocates after construction; both are driven from a single
//! real-time thread.

use crate::host::{PlayCallback, RecordCallback};
use crate::types::{BYTES_PER_SAMPLE, Channels, HARDWARE_BYTES_PER_FRAME, StreamConfig};

/// Playback side: pulls packets from the telephony stack on demand and
/// spreads them over hardware buffers of any size.
#[derive(Debug)]
pub struct PlaybackBuffer {
    packet: Box<[u8]>,
    /// First byte of `packet` not yet handed to the hardware.
    /// Zero means no leftover data.
    offset: usize,
    timestamp: u32,
    samples_per_frame: u32,
    channels: Channels,
}

impl PlaybackBuffer {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            packet: vec![0u8; config.packet_size()].into_boxed_slice(),
            offset: 0,
            timestamp: 0,
            samples_per_frame: config.samples_per_frame,
            channels: config.channels,
        }
    }

    /// Packet size in bytes
    pub fn packet_size(&self) -> usize {
        self.packet.len()
    }

    /// Offset of the first undelivered byte of the current packet
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Timestamp, in samples, the next produced packet will carry
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Bytes of the current packet still waiting for the hardware
    pub fn leftover(&self) -> usize {
        if self.offset == 0 {
            0
        } else {
            self.packet.len() - self.offset
        }
    }

    /// Fill `dest` (interleaved stereo 16-bit) completely, calling `play` for
    /// a new packet whenever the leftover runs out. Returns the number of
    /// packets produced.
    pub fn fill(&mut self, dest: &mut [u8], play: &mut dyn PlayCallback) -> usize {
        match self.channels {
            Channels::Mono => self.fill_mono(dest, play),
            Channels::Stereo => self.fill_stereo(dest, play),
        }
    }

    fn produce(&mut self, play: &mut dyn PlayCallback) {
        play.on_play(self.timestamp, &mut self.packet);
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_frame);
        self.offset = 0;
    }

    fn fill_mono(&mut self, dest: &mut [u8], play: &mut dyn PlayCallback) -> usize {
        let mut produced = 0;
        let mut written = 0;
        // A trailing partial frame cannot hold a duplicated sample
        let usable = dest.len() - dest.len() % HARDWARE_BYTES_PER_FRAME;

        while written < usable {
            let pending = if self.offset == 0 {
                self.produce(play);
                produced += 1;
                self.packet.len()
            } else {
                self.packet.len() - self.offset
            };

            let samples = (pending / BYTES_PER_SAMPLE).min((usable - written) / HARDWARE_BYTES_PER_FRAME);
            let src = &self.packet[self.offset..self.offset + samples * BYTES_PER_SAMPLE];
            let out = &mut dest[written..written + samples * HARDWARE_BYTES_PER_FRAME];
            for (sample, frame) in src
                .chunks_exact(BYTES_PER_SAMPLE)
                .zip(out.chunks_exact_mut(HARDWARE_BYTES_PER_FRAME))
            {
                frame[..BYTES_PER_SAMPLE].copy_from_slice(sample);
                frame[BYTES_PER_SAMPLE..].copy_from_slice(sample);
            }

            written += samples * HARDWARE_BYTES_PER_FRAME;
            self.offset += samples * BYTES_PER_SAMPLE;
            if self.offset >= self.packet.len() {
                self.offset = 0;
            }
            if samples == 0 {
                break;
            }
        }

        dest[written..].fill(0);
        produced
    }

    fn fill_stereo(&mut self, dest: &mut [u8], play: &mut dyn PlayCallback) -> usize {
        let mut produced = 0;
        let mut written = 0;

        while written < dest.len() {
            if self.offset == 0 {
                self.produce(play);
                produced += 1;
            }
            let count = (self.packet.len() - self.offset).min(dest.len() - written);
            dest[written..written + count]
                .copy_from_slice(&self.packet[self.offset..self.offset + count]);
            written += count;
            self.offset += count;
            if self.offset >= self.packet.len() {
                self.offset = 0;
            }
        }

        produced
    }
}

/// Capture side: accumulates hardware frames into packets and hands every
/// complete packet to the telephony stack.
#[derive(Debug)]
pub struct CaptureBuffer {
    packet: Box<[u8]>,
    /// First empty byte of `packet`
    offset: usize,
    timestamp: u32,
    frames_per_packet: u32,
    channels: Channels,
}

impl CaptureBuffer {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            packet: vec![0u8; config.packet_size()].into_boxed_slice(),
            offset: 0,
            timestamp: 0,
            frames_per_packet: config.frames_per_packet(),
            channels: config.channels,
        }
    }

    /// Packet size in bytes
    pub fn packet_size(&self) -> usize {
        self.packet.len()
    }

    /// Bytes of the current packet already filled
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Timestamp, in samples, the next delivered packet will carry
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Consume all of `src` (interleaved stereo 16-bit), calling `record`
    /// each time a packet fills up. Returns the number of packets delivered.
    pub fn consume(&mut self, src: &[u8], record: &mut dyn RecordCallback) -> usize {
        match self.channels {
            Channels::Mono => self.consume_mono(src, record),
            Channels::Stereo => self.consume_stereo(src, record),
        }
    }

    fn deliver(&mut self, record: &mut dyn RecordCallback) {
        record.on_record(self.timestamp, &self.packet);
        self.timestamp = self.timestamp.wrapping_add(self.frames_per_packet);
        self.offset = 0;
    }

    fn consume_mono(&mut self, src: &[u8], record: &mut dyn RecordCallback) -> usize {
        let mut delivered = 0;
        // Left channel of each stereo frame; the right one is dropped
        for frame in src.chunks_exact(HARDWARE_BYTES_PER_FRAME) {
            self.packet[self.offset..self.offset + BYTES_PER_SAMPLE]
                .copy_from_slice(&frame[..BYTES_PER_SAMPLE]);
            self.offset += BYTES_PER_SAMPLE;
            if self.offset == self.packet.len() {
                self.deliver(record);
                delivered += 1;
            }
        }
        delivered
    }

    fn consume_stereo(&mut self, src: &[u8], record: &mut dyn RecordCallback) -> usize {
        let mut delivered = 0;
        let mut read = 0;
        while read < src.len() {
            let count = (self.packet.len() - self.offset).min(src.len() - read);
            self.packet[self.offset..self.offset + count].copy_from_slice(&src[read..read + count]);
            read += count;
            self.offset += count;
            if self.offset == self.packet.len() {
                self.deliver(record);
                delivered += 1;
            }
        }
        delivered
    }
}

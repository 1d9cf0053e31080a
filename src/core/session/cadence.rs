//! Upstream frame cadence.
//!
//! PCM16 bytes at the backend input rate accumulate here and leave in whole
//! fixed-duration frames. The remainder stays buffered for the next push.

use bytes::{Bytes, BytesMut};

use crate::core::codec::{AudioEncoding, AudioFormat};

/// Frame duration used when none is configured.
pub const DEFAULT_FRAME_MS: u32 = 20;

/// Speech needed since the last response before a new one is requested.
pub const DEFAULT_MIN_SPEECH_MS: u64 = 300;

/// Bound on audio held while the backend link is not open.
pub const DEFAULT_MAX_BUFFERED_MS: u32 = 2000;

/// Timing knobs for the upstream cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceSettings {
    pub frame_ms: u32,
    pub min_speech_ms: u64,
    pub max_buffered_ms: u32,
}

impl Default for CadenceSettings {
    fn default() -> Self {
        Self {
            frame_ms: DEFAULT_FRAME_MS,
            min_speech_ms: DEFAULT_MIN_SPEECH_MS,
            max_buffered_ms: DEFAULT_MAX_BUFFERED_MS,
        }
    }
}

#[derive(Debug)]
pub struct UpstreamCadence {
    settings: CadenceSettings,
    frame_bytes: usize,
    max_buffered_bytes: usize,
    buffer: BytesMut,
    accumulated_speech_ms: u64,
}

impl UpstreamCadence {
    /// Cadence for PCM16 at `sample_rate` Hz.
    pub fn new(sample_rate: u32, settings: CadenceSettings) -> Self {
        let format = AudioFormat::new(AudioEncoding::Pcm16, sample_rate);
        let frame_bytes = format.bytes_for_ms(settings.frame_ms).max(2);
        let max_buffered_bytes = format
            .bytes_for_ms(settings.max_buffered_ms)
            .max(frame_bytes);

        Self {
            settings,
            frame_bytes,
            max_buffered_bytes,
            buffer: BytesMut::with_capacity(frame_bytes * 2),
            accumulated_speech_ms: 0,
        }
    }

    /// Append PCM16 bytes. Returns how many of the oldest bytes were
    /// discarded to stay within the buffer bound.
    pub fn push(&mut self, pcm: &[u8]) -> usize {
        self.buffer.extend_from_slice(pcm);
        if self.buffer.len() <= self.max_buffered_bytes {
            return 0;
        }
        // Keep sample alignment when trimming.
        let mut excess = self.buffer.len() - self.max_buffered_bytes;
        excess += excess % 2;
        let excess = excess.min(self.buffer.len());
        let _ = self.buffer.split_to(excess);
        excess
    }

    /// Slice off every whole frame, oldest first.
    pub fn take_frames(&mut self) -> Vec<Bytes> {
        let count = self.buffer.len() / self.frame_bytes;
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.buffer.split_to(self.frame_bytes).freeze());
        }
        self.accumulated_speech_ms += count as u64 * self.settings.frame_ms as u64;
        frames
    }

    /// Whether enough speech was appended since the last response.
    pub fn speech_threshold_reached(&self) -> bool {
        self.accumulated_speech_ms >= self.settings.min_speech_ms
    }

    pub fn reset_speech(&mut self) {
        self.accumulated_speech_ms = 0;
    }

    /// Drop buffered audio and the speech counter.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.accumulated_speech_ms = 0;
    }

    pub fn accumulated_speech_ms(&self) -> u64 {
        self.accumulated_speech_ms
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cadence() -> UpstreamCadence {
        UpstreamCadence::new(24000, CadenceSettings::default())
    }

    #[test]
    fn test_frame_size_matches_rate() {
        assert_eq!(cadence().frame_bytes(), 960);
        assert_eq!(
            UpstreamCadence::new(8000, CadenceSettings::default()).frame_bytes(),
            320
        );
    }

    #[test]
    fn test_whole_frames_leave_and_remainder_stays() {
        let mut c = cadence();
        c.push(&vec![0u8; 960 * 3 + 100]);
        let frames = c.take_frames();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 960));
        assert_eq!(c.buffered_len(), 100);

        c.push(&vec![0u8; 860]);
        assert_eq!(c.take_frames().len(), 1);
        assert_eq!(c.buffered_len(), 0);
    }

    #[test]
    fn test_frames_preserve_order() {
        let mut c = UpstreamCadence::new(100, CadenceSettings::default());
        // 100Hz * 20ms = 2 samples = 4 bytes per frame
        c.push(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let frames = c.take_frames();
        assert_eq!(frames[0].as_ref(), &[1, 2, 3, 4]);
        assert_eq!(frames[1].as_ref(), &[5, 6, 7, 8]);
        assert_eq!(c.buffered_len(), 1);
    }

    #[test]
    fn test_speech_threshold() {
        let mut c = cadence();
        for _ in 0..14 {
            c.push(&[0u8; 960]);
            c.take_frames();
        }
        assert_eq!(c.accumulated_speech_ms(), 280);
        assert!(!c.speech_threshold_reached());

        c.push(&[0u8; 960]);
        c.take_frames();
        assert!(c.speech_threshold_reached());

        c.reset_speech();
        assert!(!c.speech_threshold_reached());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let settings = CadenceSettings {
            max_buffered_ms: 40,
            ..CadenceSettings::default()
        };
        let mut c = UpstreamCadence::new(24000, settings);
        let dropped = c.push(&vec![0u8; 960 * 5]);
        assert_eq!(dropped, 960 * 3);
        assert_eq!(c.buffered_len(), 960 * 2);
    }

    #[test]
    fn test_clear() {
        let mut c = cadence();
        c.push(&[0u8; 2000]);
        c.take_frames();
        c.clear();
        assert_eq!(c.buffered_len(), 0);
        assert_eq!(c.accumulated_speech_ms(), 0);
    }
}

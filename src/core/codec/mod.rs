//! Audio codec primitives for the telephony bridge.
//!
//! Everything here is stateless: μ-law companding, little-endian PCM16
//! packing, and sample-rate conversion through the [`Resampler`] trait.
//!
//! # Audio Format
//!
//! All internal processing happens on mono PCM16 samples. Wire formats are
//! described by [`AudioFormat`] (encoding plus sample rate).

mod mulaw;
mod resample;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use mulaw::{decode_mulaw_bytes, encode_mulaw_samples, mulaw_decode, mulaw_encode};
pub use resample::{LinearResampler, Resampler};

/// Errors raised while interpreting audio parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unsupported audio encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(String),
}

/// Wire encodings understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    /// 8-bit G.711 μ-law.
    Mulaw,
    /// 16-bit signed little-endian linear PCM.
    Pcm16,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Mulaw => "mulaw",
            AudioEncoding::Pcm16 => "pcm16",
        }
    }

    /// Bytes used by one sample on the wire.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioEncoding::Mulaw => 1,
            AudioEncoding::Pcm16 => 2,
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioEncoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mulaw" | "ulaw" | "g711_ulaw" | "pcmu" => Ok(AudioEncoding::Mulaw),
            "pcm16" | "pcm" | "linear16" | "s16le" => Ok(AudioEncoding::Pcm16),
            other => Err(CodecError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Encoding plus sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub const fn new(encoding: AudioEncoding, sample_rate: u32) -> Self {
        Self {
            encoding,
            sample_rate,
        }
    }

    /// Wire bytes for `duration_ms` of audio in this format.
    pub fn bytes_for_ms(&self, duration_ms: u32) -> usize {
        (self.sample_rate as usize * duration_ms as usize / 1000) * self.encoding.bytes_per_sample()
    }

    /// Duration in milliseconds of `len` wire bytes in this format.
    pub fn duration_ms(&self, len: usize) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        let samples = (len / self.encoding.bytes_per_sample()) as u64;
        samples * 1000 / self.sample_rate as u64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}Hz", self.encoding, self.sample_rate)
    }
}

/// Parse a sample rate string, rejecting zero.
pub fn parse_sample_rate(value: &str) -> Result<u32, CodecError> {
    match value.trim().parse::<u32>() {
        Ok(rate) if rate > 0 => Ok(rate),
        _ => Err(CodecError::InvalidSampleRate(value.to_string())),
    }
}

// =============================================================================
// PCM16 packing
// =============================================================================

/// Unpack little-endian PCM16 bytes. A trailing odd byte is ignored.
pub fn pcm16_from_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Pack samples as little-endian PCM16 bytes.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

// =============================================================================
// Transcoding
// =============================================================================

/// Decode wire bytes in `from` and resample to `target_rate`.
pub fn to_pcm16(
    bytes: &[u8],
    from: AudioFormat,
    target_rate: u32,
    resampler: &dyn Resampler,
) -> Vec<i16> {
    let samples = match from.encoding {
        AudioEncoding::Mulaw => decode_mulaw_bytes(bytes),
        AudioEncoding::Pcm16 => pcm16_from_bytes(bytes),
    };
    resampler.resample(&samples, from.sample_rate, target_rate)
}

/// Resample from `source_rate` and encode into the `to` wire format.
pub fn from_pcm16(
    samples: &[i16],
    source_rate: u32,
    to: AudioFormat,
    resampler: &dyn Resampler,
) -> Vec<u8> {
    let resampled = resampler.resample(samples, source_rate, to.sample_rate);
    match to.encoding {
        AudioEncoding::Mulaw => encode_mulaw_samples(&resampled),
        AudioEncoding::Pcm16 => pcm16_to_bytes(&resampled),
    }
}

/// Convert wire bytes between two formats.
pub fn transcode(
    bytes: &[u8],
    from: AudioFormat,
    to: AudioFormat,
    resampler: &dyn Resampler,
) -> Vec<u8> {
    if from == to {
        return bytes.to_vec();
    }
    let samples = to_pcm16(bytes, from, from.sample_rate, resampler);
    from_pcm16(&samples, from.sample_rate, to, resampler)
}

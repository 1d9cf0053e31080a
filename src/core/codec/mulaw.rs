//! G.711 μ-law companding.
//!
//! Works on 14-bit magnitudes (16-bit samples shifted right by two) with the
//! classic bias of 33, which is the same curve as the 0x84 bias applied to
//! full 16-bit samples.

/// Bias added to the 14-bit magnitude before segment search.
const BIAS: i32 = 33;

/// Largest 14-bit magnitude that still fits the top segment once biased.
const CLIP: i32 = 8158;

/// Encode one signed 16-bit PCM sample as a μ-law byte.
///
/// The magnitude is clamped before biasing so that full-scale input never
/// wraps into the wrong segment.
pub fn mulaw_encode(sample: i16) -> u8 {
    let sample = sample as i32;
    let sign: u8 = if sample < 0 { 0x80 } else { 0x00 };

    let magnitude = (sample.abs() >> 2).min(CLIP) + BIAS;

    // Segment is the position of the highest set bit above bit 5.
    let mut exponent: u8 = 7;
    let mut mask = 0x1000;
    while exponent > 0 && magnitude & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((magnitude >> (exponent + 1)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decode one μ-law byte into a signed 16-bit PCM sample.
pub fn mulaw_decode(byte: u8) -> i16 {
    let byte = !byte;
    let negative = byte & 0x80 != 0;
    let exponent = ((byte >> 4) & 0x07) as i32;
    let mantissa = (byte & 0x0F) as i32;

    let magnitude = ((((mantissa << 1) + BIAS) << exponent) - BIAS) << 2;
    let sample = if negative { -magnitude } else { magnitude };
    sample.clamp(-32767, 32767) as i16
}

/// Decode a μ-law byte stream into PCM16 samples.
pub fn decode_mulaw_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().copied().map(mulaw_decode).collect()
}

/// Encode PCM16 samples into a μ-law byte stream.
pub fn encode_mulaw_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().copied().map(mulaw_encode).collect()
}

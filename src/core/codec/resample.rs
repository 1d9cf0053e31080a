//! Sample-rate conversion.
//!
//! Callers hold a `&dyn Resampler` so the interpolation strategy can be
//! swapped without touching the transcoding paths.

/// Converts mono PCM16 samples between sample rates.
pub trait Resampler: Send + Sync + std::fmt::Debug {
    /// Resample `samples` from `src_rate` Hz to `dst_rate` Hz.
    fn resample(&self, samples: &[i16], src_rate: u32, dst_rate: u32) -> Vec<i16>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Linear interpolation between the two nearest source samples.
///
/// Not band-limited: downsampling aliases. Good enough for narrowband
/// telephony where the source is already band-limited.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearResampler;

impl LinearResampler {
    pub fn new() -> Self {
        Self
    }

    /// Number of output samples for `len` input samples.
    pub fn output_len(len: usize, src_rate: u32, dst_rate: u32) -> usize {
        if src_rate == 0 {
            return 0;
        }
        ((len as u64 * dst_rate as u64) / src_rate as u64) as usize
    }
}

impl Resampler for LinearResampler {
    fn resample(&self, samples: &[i16], src_rate: u32, dst_rate: u32) -> Vec<i16> {
        if src_rate == dst_rate {
            return samples.to_vec();
        }
        let out_len = Self::output_len(samples.len(), src_rate, dst_rate);
        if out_len == 0 || samples.is_empty() {
            return Vec::new();
        }

        let last = samples.len() - 1;

        (0..out_len)
            .map(|i| {
                let position = (i as u64 * src_rate as u64) as f64 / dst_rate as f64;
                let index = (position.floor() as usize).min(last);
                let next = (index + 1).min(last);
                let fraction = position - index as f64;

                let a = samples[index] as f64;
                let b = samples[next] as f64;
                (a + (b - a) * fraction)
                    .round()
                    .clamp(i16::MIN as f64, i16::MAX as f64) as i16
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

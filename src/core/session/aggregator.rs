//! Downstream response aggregation.
//!
//! Backend audio is collected per response and released as one clip when the
//! response completes. Rendering converts the clip once per distinct consumer
//! format.

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

use super::client::ClientHandle;
use crate::core::codec::{AudioFormat, Resampler, from_pcm16, to_pcm16};

#[derive(Debug, Default)]
pub struct ResponseAggregator {
    chunks: Vec<Bytes>,
    total_len: usize,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.total_len += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Concatenate and clear. `None` when nothing was collected.
    pub fn take(&mut self) -> Option<Bytes> {
        let total = std::mem::take(&mut self.total_len);
        let chunks = std::mem::take(&mut self.chunks);
        if total == 0 {
            return None;
        }
        let mut clip = BytesMut::with_capacity(total);
        for chunk in chunks {
            clip.extend_from_slice(&chunk);
        }
        Some(clip.freeze())
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_len = 0;
    }
}

/// One clip ready for one consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub client: ClientHandle,
    pub audio: Bytes,
}

/// Convert `clip` (in `source` format) for each consumer.
///
/// Conversions are cached per distinct output format. Consumers whose
/// converted clip is empty are skipped.
pub fn render_for_clients<'a>(
    clip: &[u8],
    source: AudioFormat,
    clients: impl IntoIterator<Item = &'a ClientHandle>,
    resampler: &dyn Resampler,
) -> Vec<Delivery> {
    let samples = to_pcm16(clip, source, source.sample_rate, resampler);
    let mut cache: HashMap<AudioFormat, Bytes> = HashMap::new();

    clients
        .into_iter()
        .filter_map(|client| {
            let format = client.output_format();
            let audio = cache
                .entry(format)
                .or_insert_with(|| {
                    if format == source {
                        Bytes::copy_from_slice(clip)
                    } else {
                        Bytes::from(from_pcm16(&samples, source.sample_rate, format, resampler))
                    }
                })
                .clone();
            (!audio.is_empty()).then(|| Delivery {
                client: client.clone(),
                audio,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{AudioEncoding, LinearResampler, pcm16_to_bytes};

    #[test]
    fn test_take_concatenates_in_order() {
        let mut agg = ResponseAggregator::new();
        agg.push(Bytes::from_static(&[1, 2]));
        agg.push(Bytes::new());
        agg.push(Bytes::from_static(&[3]));
        assert_eq!(agg.chunk_count(), 2);
        assert_eq!(agg.total_len(), 3);
        assert_eq!(agg.take().unwrap().as_ref(), &[1, 2, 3]);
        assert!(agg.take().is_none());
    }

    #[test]
    fn test_clear_discards() {
        let mut agg = ResponseAggregator::new();
        agg.push(Bytes::from_static(&[9]));
        agg.clear();
        assert!(agg.take().is_none());
    }

    #[test]
    fn test_render_per_client_format() {
        let resampler = LinearResampler::new();
        let source = AudioFormat::new(AudioEncoding::Pcm16, 24000);
        let clip = pcm16_to_bytes(&vec![0i16; 480]);

        let (mulaw8k, _rx1) = ClientHandle::new(AudioFormat::new(AudioEncoding::Mulaw, 8000));
        let (pcm16k, _rx2) = ClientHandle::new(AudioFormat::new(AudioEncoding::Pcm16, 16000));
        let (same, _rx3) = ClientHandle::new(source);

        let out = render_for_clients(&clip, source, [&mulaw8k, &pcm16k, &same], &resampler);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].audio.len(), 160);
        assert!(out[0].audio.iter().all(|b| *b == 0xFF));
        assert_eq!(out[1].audio.len(), 640);
        assert_eq!(out[2].audio.as_ref(), clip.as_slice());
        assert_eq!(out[0].client.id(), mulaw8k.id());
    }

    #[test]
    fn test_render_skips_empty_conversions() {
        let resampler = LinearResampler::new();
        let source = AudioFormat::new(AudioEncoding::Pcm16, 24000);
        let (client, _rx) = ClientHandle::new(AudioFormat::new(AudioEncoding::Mulaw, 8000));
        // One sample at 24kHz floors to zero samples at 8kHz.
        let out = render_for_clients(&[0, 0], source, [&client], &resampler);
        assert!(out.is_empty());
    }
}

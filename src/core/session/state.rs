//! Per-call bridging state.
//!
//! [`SessionState`] is owned by exactly one session actor and is never shared.
//! Its methods take input (audio, backend events, control commands, timer
//! expiry) and return the backend events or downstream deliveries the actor
//! must perform. No I/O happens here.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::aggregator::{Delivery, ResponseAggregator, render_for_clients};
use super::cadence::{CadenceSettings, UpstreamCadence};
use super::client::{ClientHandle, ClientId, ClientPrefs};
use crate::core::codec::{
    AudioEncoding, AudioFormat, Resampler, encode_mulaw_samples, pcm16_from_bytes,
    pcm16_to_bytes, to_pcm16,
};
use crate::core::realtime::{BackendConfig, BackendEvent, ClientEvent, RealtimeError, ResponseRequest};

/// Settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub backend: BackendConfig,
    pub cadence: CadenceSettings,
    /// Formats assumed when a consumer does not specify them
    pub default_prefs: ClientPrefs,
}

#[derive(Debug)]
pub struct SessionState {
    call_id: String,
    settings: Arc<SessionSettings>,
    resampler: Arc<dyn Resampler>,
    prefs: ClientPrefs,
    clients: HashMap<ClientId, ClientHandle>,
    cadence: UpstreamCadence,
    output: ResponseAggregator,
    pending_since: Option<Instant>,
    link_open: bool,
    upstream_closed: bool,
}

impl SessionState {
    pub fn new(
        call_id: impl Into<String>,
        settings: Arc<SessionSettings>,
        resampler: Arc<dyn Resampler>,
    ) -> Self {
        let cadence = UpstreamCadence::new(
            settings.backend.input_format.sample_rate,
            settings.cadence,
        );
        Self {
            call_id: call_id.into(),
            prefs: settings.default_prefs,
            settings,
            resampler,
            clients: HashMap::new(),
            cadence,
            output: ResponseAggregator::new(),
            pending_since: None,
            link_open: false,
            upstream_closed: false,
        }
    }

    // -------------------------------------------------------------------------
    // Consumers
    // -------------------------------------------------------------------------

    /// Add a consumer. Its formats become the session's negotiated formats.
    pub fn attach(&mut self, client: ClientHandle, prefs: ClientPrefs) {
        self.prefs = prefs;
        self.clients.insert(client.id(), client);
    }

    /// Remove a consumer, returning how many remain.
    pub fn detach(&mut self, client_id: ClientId) -> usize {
        self.clients.remove(&client_id);
        self.clients.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn clients(&self) -> impl Iterator<Item = &ClientHandle> {
        self.clients.values()
    }

    // -------------------------------------------------------------------------
    // Upstream
    // -------------------------------------------------------------------------

    /// Accept a binary frame from a consumer.
    ///
    /// The frame is converted to PCM16 at the backend input rate and buffered.
    /// Frames only leave while the link is open.
    pub fn on_upstream_audio(&mut self, wire: &[u8], now: Instant) -> Vec<ClientEvent> {
        if self.upstream_closed {
            return Vec::new();
        }
        let backend_rate = self.settings.backend.input_format.sample_rate;
        let samples = to_pcm16(wire, self.prefs.input, backend_rate, self.resampler.as_ref());
        let dropped = self.cadence.push(&pcm16_to_bytes(&samples));
        if dropped > 0 {
            debug!(call_id = %self.call_id, dropped, "Upstream buffer full, dropped oldest audio");
        }

        if self.link_open {
            self.drain_upstream(now)
        } else {
            Vec::new()
        }
    }

    /// Emit every whole frame, then commit and possibly request a response.
    fn drain_upstream(&mut self, now: Instant) -> Vec<ClientEvent> {
        let frames = self.cadence.take_frames();
        let mut events = Vec::with_capacity(frames.len() + 2);

        let backend_encoding = self.settings.backend.input_format.encoding;
        for frame in &frames {
            let event = match backend_encoding {
                AudioEncoding::Pcm16 => ClientEvent::audio_append(frame),
                AudioEncoding::Mulaw => {
                    ClientEvent::audio_append(&encode_mulaw_samples(&pcm16_from_bytes(frame)))
                }
            };
            events.push(event);
        }
        if !frames.is_empty() {
            events.push(ClientEvent::InputAudioBufferCommit);
        }

        if self.pending_since.is_none() && self.cadence.speech_threshold_reached() {
            let backend = &self.settings.backend;
            events.push(ClientEvent::response_create(ResponseRequest::audio(
                backend.instructions.clone(),
                backend.voice.clone(),
            )));
            self.pending_since = Some(now);
            debug!(
                call_id = %self.call_id,
                speech_ms = self.cadence.accumulated_speech_ms(),
                "Requested response"
            );
        }

        events
    }

    // -------------------------------------------------------------------------
    // Link lifecycle
    // -------------------------------------------------------------------------

    /// The backend link opened: declare formats and drain buffered audio.
    pub fn on_link_open(&mut self, now: Instant) -> Vec<ClientEvent> {
        self.link_open = true;
        let backend = &self.settings.backend;
        let mut events = vec![ClientEvent::session_update(
            backend.input_format,
            backend.output_format,
        )];
        events.extend(self.drain_upstream(now));
        events
    }

    /// The backend link dropped. Any response in flight is lost.
    pub fn on_link_closed(&mut self) {
        self.link_open = false;
        self.pending_since = None;
        self.output.clear();
    }

    /// Explicit `close` from a consumer: no more upstream traffic.
    pub fn on_close_requested(&mut self) {
        self.upstream_closed = true;
        self.on_link_closed();
        self.cadence.clear();
    }

    // -------------------------------------------------------------------------
    // Downstream
    // -------------------------------------------------------------------------

    /// Apply a backend event. Returns deliveries when a response completed.
    pub fn on_backend_event(&mut self, event: BackendEvent) -> Option<Vec<Delivery>> {
        match event {
            BackendEvent::Audio(chunk) => {
                self.output.push(chunk);
                None
            }
            BackendEvent::ResponseComplete { kind } => {
                debug!(call_id = %self.call_id, %kind, "Response complete");
                Some(self.flush())
            }
            BackendEvent::Error { message } => {
                let err = RealtimeError::ProviderError(message);
                warn!(call_id = %self.call_id, "Backend error: {}", err);
                None
            }
            BackendEvent::Other { .. } => None,
        }
    }

    /// Release the aggregated clip and return to idle.
    pub fn flush(&mut self) -> Vec<Delivery> {
        let clip = self.output.take();
        self.pending_since = None;
        self.cadence.reset_speech();

        let Some(clip) = clip else {
            return Vec::new();
        };
        render_for_clients(
            &clip,
            self.settings.backend.output_format,
            self.clients.values(),
            self.resampler.as_ref(),
        )
    }

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------

    /// `say`: request a response with literal instructions if idle.
    pub fn on_say(&mut self, text: String, now: Instant) -> Option<ClientEvent> {
        if !self.link_open || self.upstream_closed || self.pending_since.is_some() {
            debug!(call_id = %self.call_id, "Ignoring say, link not idle");
            return None;
        }
        self.pending_since = Some(now);
        Some(ClientEvent::response_create(ResponseRequest::audio(
            text,
            self.settings.backend.voice.clone(),
        )))
    }

    /// When the outstanding response must have completed by.
    pub fn response_deadline(&self) -> Option<Instant> {
        self.pending_since
            .map(|since| since + self.settings.backend.response_timeout)
    }

    /// The pending response overran its deadline: cancel it and go idle.
    ///
    /// Accumulated speech is kept so the next frame can retry.
    pub fn on_response_timeout(&mut self) -> Vec<ClientEvent> {
        if self.pending_since.take().is_none() {
            return Vec::new();
        }
        self.output.clear();
        let err = RealtimeError::Timeout("response generation".into());
        warn!(
            call_id = %self.call_id,
            retryable = err.is_retryable(),
            "Cancelling response: {}", err
        );
        if self.link_open {
            vec![ClientEvent::ResponseCancel]
        } else {
            Vec::new()
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    pub fn is_link_open(&self) -> bool {
        self.link_open
    }

    pub fn is_upstream_closed(&self) -> bool {
        self.upstream_closed
    }

    pub fn accumulated_speech_ms(&self) -> u64 {
        self.cadence.accumulated_speech_ms()
    }

    pub fn buffered_upstream_bytes(&self) -> usize {
        self.cadence.buffered_len()
    }

    pub fn input_format(&self) -> AudioFormat {
        self.prefs.input
    }

    pub fn output_format(&self) -> AudioFormat {
        self.prefs.output
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        info!(call_id = %self.call_id, "Session state released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::LinearResampler;
    use bytes::Bytes;
    use std::time::Duration;

    fn mulaw8k() -> AudioFormat {
        AudioFormat::new(AudioEncoding::Mulaw, 8000)
    }

    fn settings() -> Arc<SessionSettings> {
        Arc::new(SessionSettings {
            backend: BackendConfig::default(),
            cadence: CadenceSettings::default(),
            default_prefs: ClientPrefs {
                input: mulaw8k(),
                output: mulaw8k(),
            },
        })
    }

    fn state() -> SessionState {
        SessionState::new("call-1", settings(), Arc::new(LinearResampler::new()))
    }

    fn count(events: &[ClientEvent], kind: &str) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_audio_is_held_until_link_opens() {
        let mut s = state();
        let now = Instant::now();
        assert!(s.on_upstream_audio(&[0xFF; 160], now).is_empty());
        assert_eq!(s.buffered_upstream_bytes(), 960);

        let events = s.on_link_open(now);
        assert_eq!(events[0].kind(), "session.update");
        assert_eq!(count(&events, "input_audio_buffer.append"), 1);
        assert_eq!(count(&events, "input_audio_buffer.commit"), 1);
        assert_eq!(s.buffered_upstream_bytes(), 0);
    }

    #[test]
    fn test_one_commit_per_batch() {
        let mut s = state();
        let now = Instant::now();
        s.on_link_open(now);
        let events = s.on_upstream_audio(&[0xFF; 480], now);
        assert_eq!(count(&events, "input_audio_buffer.append"), 3);
        assert_eq!(count(&events, "input_audio_buffer.commit"), 1);

        // Less than a frame: nothing, not even a commit
        let events = s.on_upstream_audio(&[0xFF; 80], now);
        assert!(events.is_empty());
    }

    #[test]
    fn test_response_requested_once_at_threshold() {
        let mut s = state();
        let now = Instant::now();
        s.on_link_open(now);

        let mut creates = 0;
        for i in 0..20 {
            let events = s.on_upstream_audio(&[0xFF; 160], now);
            let c = count(&events, "response.create");
            if c > 0 {
                assert_eq!(i, 14, "response must trigger on the 15th frame");
            }
            creates += c;
        }
        assert_eq!(creates, 1);
        assert!(s.is_pending());
    }

    #[test]
    fn test_completion_flushes_once_and_resets() {
        let mut s = state();
        let now = Instant::now();
        let (client, _rx) = ClientHandle::new(mulaw8k());
        s.attach(client.clone(), ClientPrefs { input: mulaw8k(), output: mulaw8k() });
        s.on_link_open(now);
        for _ in 0..15 {
            s.on_upstream_audio(&[0xFF; 160], now);
        }
        assert!(s.is_pending());

        let pcm = Bytes::from(vec![0u8; 960]);
        assert!(s.on_backend_event(BackendEvent::Audio(pcm.clone())).is_none());
        assert!(s.on_backend_event(BackendEvent::Audio(pcm)).is_none());

        let deliveries = s
            .on_backend_event(BackendEvent::ResponseComplete { kind: "response.done".into() })
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].audio.len(), 320);
        assert!(!s.is_pending());
        assert_eq!(s.accumulated_speech_ms(), 0);

        // A second completion has nothing left to emit
        let again = s
            .on_backend_event(BackendEvent::ResponseComplete { kind: "response.done".into() })
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_say_requires_open_idle_link() {
        let mut s = state();
        let now = Instant::now();
        assert!(s.on_say("hello".into(), now).is_none());

        s.on_link_open(now);
        let event = s.on_say("hello".into(), now).unwrap();
        match event {
            ClientEvent::ResponseCreate { response } => {
                assert_eq!(response.instructions, "hello");
                assert_eq!(response.modalities, vec!["audio".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(s.on_say("again".into(), now).is_none());
    }

    #[test]
    fn test_response_timeout_returns_to_idle() {
        let mut s = state();
        let now = Instant::now();
        s.on_link_open(now);
        s.on_say("hi".into(), now);
        s.on_backend_event(BackendEvent::Audio(Bytes::from_static(&[1, 2])));

        assert_eq!(s.response_deadline(), Some(now + Duration::from_secs(15)));
        let events = s.on_response_timeout();
        assert_eq!(events, vec![ClientEvent::ResponseCancel]);
        assert!(!s.is_pending());
        assert!(s.response_deadline().is_none());
        assert!(s.on_response_timeout().is_empty());

        // Partial audio was discarded
        let flushed = s
            .on_backend_event(BackendEvent::ResponseComplete { kind: "response.done".into() })
            .unwrap();
        assert!(flushed.is_empty());
    }

    #[test]
    fn test_close_stops_upstream() {
        let mut s = state();
        let now = Instant::now();
        s.on_link_open(now);
        s.on_close_requested();
        assert!(s.is_upstream_closed());
        assert!(!s.is_link_open());
        assert!(s.on_upstream_audio(&[0xFF; 160], now).is_empty());
        assert_eq!(s.buffered_upstream_bytes(), 0);
    }

    #[test]
    fn test_last_writer_wins_prefs() {
        let mut s = state();
        let pcm16k = AudioFormat::new(AudioEncoding::Pcm16, 16000);
        let (a, _ra) = ClientHandle::new(mulaw8k());
        let (b, _rb) = ClientHandle::new(pcm16k);
        s.attach(a.clone(), ClientPrefs { input: mulaw8k(), output: mulaw8k() });
        s.attach(b.clone(), ClientPrefs { input: pcm16k, output: pcm16k });
        assert_eq!(s.input_format(), pcm16k);
        assert_eq!(s.client_count(), 2);
        assert_eq!(s.detach(a.id()), 1);
    }

    #[test]
    fn test_mulaw_backend_input_is_encoded() {
        let mut settings = (*settings()).clone();
        settings.backend.input_format = mulaw8k();
        let mut s = SessionState::new("c", Arc::new(settings), Arc::new(LinearResampler::new()));
        let now = Instant::now();
        let events = s.on_link_open(now);
        assert_eq!(events.len(), 1);

        let events = s.on_upstream_audio(&[0xFF; 160], now);
        match &events[0] {
            ClientEvent::InputAudioBufferAppend { audio } => {
                // 160 μ-law bytes of silence, base64
                assert_eq!(audio.len(), 216);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Realtime backend WebSocket message types.
//!
//! All events are JSON-encoded and sent over WebSocket.
//!
//! # Protocol Overview
//!
//! Client events (sent to the backend):
//! - session.update - Declare input/output audio formats
//! - input_audio_buffer.append - Append one frame of audio
//! - input_audio_buffer.commit - Close out an append batch
//! - response.create - Request a response
//! - response.cancel - Abandon the current response
//!
//! Backend events are matched by shape rather than by an exhaustive schema:
//! the discriminator is read from `type` (or `event`), audio is any event
//! whose discriminator has an `audio` segment and that carries a base64
//! payload under `audio`, `delta` or `chunk`, and completion is
//! `response.done` and its variants.

use base64::prelude::*;
use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use super::base::{RealtimeError, RealtimeResult};
use crate::core::codec::{AudioEncoding, AudioFormat};

// =============================================================================
// Client Events (sent to backend)
// =============================================================================

/// Audio format as declared to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireAudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate_hz: u32,
}

impl From<AudioFormat> for WireAudioFormat {
    fn from(format: AudioFormat) -> Self {
        Self {
            encoding: format.encoding,
            sample_rate_hz: format.sample_rate,
        }
    }
}

/// Body of `session.update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFormats {
    pub input_audio_format: WireAudioFormat,
    pub output_audio_format: WireAudioFormat,
}

/// Voice selection inside a response request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseAudio {
    pub voice: String,
}

/// Body of `response.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseRequest {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub audio: ResponseAudio,
}

impl ResponseRequest {
    /// Audio-only response with the given instructions and voice.
    pub fn audio(instructions: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            modalities: vec!["audio".to_string()],
            instructions: instructions.into(),
            audio: ResponseAudio {
                voice: voice.into(),
            },
        }
    }
}

/// Events sent to the realtime backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionFormats },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio
        audio: String,
    },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseRequest },

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    pub fn session_update(input: AudioFormat, output: AudioFormat) -> Self {
        ClientEvent::SessionUpdate {
            session: SessionFormats {
                input_audio_format: input.into(),
                output_audio_format: output.into(),
            },
        }
    }

    pub fn response_create(request: ResponseRequest) -> Self {
        ClientEvent::ResponseCreate { response: request }
    }

    /// The `type` discriminator, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::ResponseCreate { .. } => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }
}

// =============================================================================
// Backend Events (received from backend)
// =============================================================================

static AUDIO_EVENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|\.)(output_)?audio(\.|$)").expect("audio event regex must compile")
});

static RESPONSE_COMPLETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^response\.(done|completed|complete|stop|stopped)$")
        .expect("completion regex must compile")
});

/// Raw envelope; only the fields used for classification are decoded.
#[derive(Debug, Default, Deserialize)]
struct RawBackendEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    event: Option<String>,
    audio: Option<Value>,
    delta: Option<Value>,
    chunk: Option<Value>,
    error: Option<Value>,
    message: Option<String>,
}

/// A classified backend event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Decoded audio bytes in the backend output format.
    Audio(Bytes),
    /// The current response finished (or was stopped).
    ResponseComplete { kind: String },
    /// The backend reported an error.
    Error { message: String },
    /// Anything else; ignored by the session.
    Other { kind: String },
}

impl BackendEvent {
    /// Classify a JSON text message.
    pub fn from_text(text: &str) -> RealtimeResult<Self> {
        let raw: RawBackendEvent = serde_json::from_str(text)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;

        let kind = raw
            .kind
            .clone()
            .or_else(|| raw.event.clone())
            .unwrap_or_default();

        if AUDIO_EVENT.is_match(&kind)
            && let Some(payload) = raw.audio_payload()
        {
            let audio = BASE64_STANDARD
                .decode(payload)
                .map_err(|e| RealtimeError::SerializationError(format!("bad audio: {e}")))?;
            return Ok(BackendEvent::Audio(Bytes::from(audio)));
        }

        if RESPONSE_COMPLETE.is_match(&kind) {
            return Ok(BackendEvent::ResponseComplete { kind });
        }

        if kind == "error" || kind.ends_with(".error") {
            return Ok(BackendEvent::Error {
                message: raw.error_message(),
            });
        }

        Ok(BackendEvent::Other { kind })
    }

    /// Binary backend frames are taken as already-decoded audio.
    pub fn from_binary(data: Bytes) -> Self {
        BackendEvent::Audio(data)
    }
}

impl RawBackendEvent {
    fn audio_payload(&self) -> Option<&str> {
        [&self.audio, &self.delta, &self.chunk]
            .into_iter()
            .find_map(|field| field.as_ref().and_then(Value::as_str))
    }

    fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| match e {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown backend error".to_string())
    }
}

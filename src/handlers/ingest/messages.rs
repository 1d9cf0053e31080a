//! Ingest socket message types
//!
//! Text frames on the ingest socket carry JSON control messages discriminated
//! by `type`. Binary frames carry raw audio and never pass through here.

use serde::Deserialize;
use tracing::warn;

use crate::core::codec::{AudioEncoding, AudioFormat, parse_sample_rate};
use crate::core::session::ClientPrefs;

/// Control messages accepted on the ingest socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Close the session's backend link
    Close,
    /// Accepted and ignored
    Ping,
    /// Speak the given text through the backend
    Say { text: String },
}

impl ControlMessage {
    /// Parse a text frame. Malformed JSON and unknown types yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Query parameters of the ingest upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestParams {
    #[serde(rename = "callId")]
    pub call_id: Option<String>,
    /// Upstream encoding
    pub enc: Option<String>,
    /// Upstream sample rate
    pub sr: Option<String>,
    /// Downstream encoding
    pub oenc: Option<String>,
    /// Downstream sample rate
    pub osr: Option<String>,
}

impl IngestParams {
    /// The call id, or a generated one when absent or blank.
    pub fn call_id(&self) -> String {
        self.call_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Negotiated formats, falling back to `defaults` for absent or invalid values.
    pub fn prefs(&self, defaults: ClientPrefs) -> ClientPrefs {
        ClientPrefs {
            input: format_or(
                defaults.input,
                self.enc.as_deref(),
                self.sr.as_deref(),
                "upstream",
            ),
            output: format_or(
                defaults.output,
                self.oenc.as_deref(),
                self.osr.as_deref(),
                "downstream",
            ),
        }
    }
}

fn format_or(
    default: AudioFormat,
    encoding: Option<&str>,
    rate: Option<&str>,
    direction: &str,
) -> AudioFormat {
    let encoding = match encoding.map(str::parse::<AudioEncoding>) {
        Some(Ok(encoding)) => encoding,
        Some(Err(e)) => {
            warn!(direction, error = %e, "Ignoring requested encoding");
            default.encoding
        }
        None => default.encoding,
    };
    let sample_rate = match rate.map(parse_sample_rate) {
        Some(Ok(rate)) => rate,
        Some(Err(e)) => {
            warn!(direction, error = %e, "Ignoring requested sample rate");
            default.sample_rate
        }
        None => default.sample_rate,
    };
    AudioFormat::new(encoding, sample_rate)
}

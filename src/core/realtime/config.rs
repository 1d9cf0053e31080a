//! Realtime backend connection settings.
//!
//! Covers the endpoint (URL, deployment, API version), the credential sent
//! in the `api-key` header, the audio formats declared in `session.update`,
//! and the response parameters used for `response.create`.

use std::time::Duration;
use url::Url;
use zeroize::Zeroize;

use super::base::{RealtimeError, RealtimeResult, ReconnectionPolicy};
use crate::core::codec::{AudioEncoding, AudioFormat};

/// Default API version appended to the backend URL.
pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";

/// Default voice for generated responses.
pub const DEFAULT_VOICE: &str = "alloy";

/// Default system instruction for generated responses.
pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful voice assistant on a phone call. Keep answers short and conversational.";

/// Default backend sample rate (PCM16 at 24kHz).
pub const DEFAULT_BACKEND_SAMPLE_RATE: u32 = 24000;

/// Default bound on an outstanding response generation.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 15_000;

/// Header carrying the backend credential.
pub const API_KEY_HEADER: &str = "api-key";

/// Everything a session needs to open and drive one backend link.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base WebSocket URL of the realtime endpoint
    pub url: Option<String>,
    /// Deployment identifier
    pub deployment: Option<String>,
    /// API key sent in the `api-key` header
    pub api_key: Option<String>,
    /// API version query parameter
    pub api_version: String,
    /// Voice requested in `response.create`
    pub voice: String,
    /// Default instructions for audio-triggered responses
    pub instructions: String,
    /// Format the backend expects for appended audio
    pub input_format: AudioFormat,
    /// Format the backend emits in audio deltas
    pub output_format: AudioFormat,
    /// Bound on a pending response before it is cancelled
    pub response_timeout: Duration,
    /// Reconnection behaviour after an unexpected disconnect
    pub reconnection: ReconnectionPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            deployment: None,
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            input_format: AudioFormat::new(AudioEncoding::Pcm16, DEFAULT_BACKEND_SAMPLE_RATE),
            output_format: AudioFormat::new(AudioEncoding::Pcm16, DEFAULT_BACKEND_SAMPLE_RATE),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            reconnection: ReconnectionPolicy::default(),
        }
    }
}

impl Drop for BackendConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.api_key {
            key.zeroize();
        }
    }
}

impl BackendConfig {
    /// True when URL, deployment and API key are all present and non-empty.
    pub fn has_credentials(&self) -> bool {
        [&self.url, &self.deployment, &self.api_key]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Build the WebSocket URL for this backend.
    ///
    /// When the base URL path already contains `/deployments`, the deployment
    /// is appended as a path segment (unless it is already the last segment)
    /// and only `api-version` is added to the query. Otherwise both
    /// `deployment` and `api-version` are query parameters. `http(s)` schemes
    /// are mapped to `ws(s)`.
    pub fn build_ws_url(&self) -> RealtimeResult<String> {
        let base = self
            .url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RealtimeError::InvalidConfiguration("backend URL not set".into()))?;
        let deployment = self
            .deployment
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                RealtimeError::InvalidConfiguration("backend deployment not set".into())
            })?;

        let mut url = Url::parse(base.trim())
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid URL: {e}")))?;

        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "unsupported URL scheme: {other}"
                )));
            }
        };
        if url.scheme() != scheme {
            // http -> ws and https -> wss are both permitted scheme changes
            url.set_scheme(scheme).map_err(|_| {
                RealtimeError::InvalidConfiguration("cannot rewrite URL scheme".into())
            })?;
        }

        if url.path().contains("/deployments") {
            let already_present = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .is_some_and(|last| last == deployment);
            if !already_present {
                let mut segments = url.path_segments_mut().map_err(|_| {
                    RealtimeError::InvalidConfiguration("URL cannot carry a path".into())
                })?;
                segments.pop_if_empty().push(deployment);
            }
            url.query_pairs_mut()
                .append_pair("api-version", &self.api_version);
        } else {
            url.query_pairs_mut()
                .append_pair("api-version", &self.api_version)
                .append_pair("deployment", deployment);
        }

        Ok(url.to_string())
    }

    /// The credential for the `api-key` header.
    pub fn api_key(&self) -> RealtimeResult<&str> {
        self.api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RealtimeError::InvalidConfiguration("backend API key not set".into()))
    }
}

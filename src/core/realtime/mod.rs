//! Realtime speech backend integration.
//!
//! - `base`: error type and reconnection policy
//! - `config`: endpoint, credential and audio settings for a backend link
//! - `messages`: outgoing client events and typed decode of backend events
//! - `client`: the [`BackendConnector`] seam and its WebSocket implementation

mod base;
mod client;
mod config;
mod messages;

pub use base::{RealtimeError, RealtimeResult, ReconnectionPolicy};
pub use client::{BackendConnector, BackendLink, WebSocketConnector};
pub use config::{
    API_KEY_HEADER, BackendConfig, DEFAULT_API_VERSION, DEFAULT_BACKEND_SAMPLE_RATE,
    DEFAULT_INSTRUCTIONS, DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_VOICE,
};
pub use messages::{
    BackendEvent, ClientEvent, ResponseAudio, ResponseRequest, SessionFormats, WireAudioFormat,
};

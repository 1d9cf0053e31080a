//! Configuration module for the voice bridge gateway
//!
//! Server configuration is read from environment variables (a `.env` file is
//! loaded into the environment by `main`) and optionally a YAML file.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable readers
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voicebridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::codec::{AudioEncoding, AudioFormat};
use crate::core::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::core::realtime::{
    BackendConfig, DEFAULT_API_VERSION, DEFAULT_BACKEND_SAMPLE_RATE, DEFAULT_INSTRUCTIONS,
    DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_VOICE, ReconnectionPolicy,
};
use crate::core::session::{
    CadenceSettings, ClientPrefs, DEFAULT_FRAME_MS, DEFAULT_MAX_BUFFERED_MS,
    DEFAULT_MIN_SPEECH_MS, SessionSettings,
};

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default consumer sample rate (telephony narrowband).
pub const DEFAULT_CLIENT_SAMPLE_RATE: u32 = 8000;
/// Default number of reconnection attempts after an unexpected backend close.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = DEFAULT_HEARTBEAT_INTERVAL.as_secs();

/// Errors raised while reading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Ingest access control (shared secret, allowed origins)
/// - Realtime backend endpoint, credential and audio formats
/// - Consumer format defaults and upstream cadence
/// - Heartbeat interval and bot orchestrator endpoint
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Ingest access control
    /// Shared secret required on the ingest socket when set
    pub gateway_secret: Option<String>,
    /// Origins allowed to open the ingest socket; empty allows all
    pub allowed_origins: Vec<String>,

    // Realtime backend
    pub realtime_url: Option<String>,
    pub realtime_deployment: Option<String>,
    pub realtime_api_key: Option<String>,
    pub realtime_api_version: String,
    pub realtime_voice: String,
    pub realtime_instructions: String,
    /// Format the backend expects for appended audio
    pub realtime_input_format: AudioFormat,
    /// Format the backend emits in audio deltas
    pub realtime_output_format: AudioFormat,
    pub response_timeout_ms: u64,
    /// Reconnection attempts after an unexpected close; 0 disables reconnection
    pub backend_reconnect_attempts: u32,

    // Consumer defaults and cadence
    pub default_input_format: AudioFormat,
    pub default_output_format: AudioFormat,
    pub frame_ms: u32,
    pub min_speech_ms: u64,
    pub max_buffered_ms: u32,

    // Heartbeat
    pub heartbeat_interval_secs: u64,

    // Bot launching
    pub bot_orchestrator_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let telephony = AudioFormat::new(AudioEncoding::Mulaw, DEFAULT_CLIENT_SAMPLE_RATE);
        let backend = AudioFormat::new(AudioEncoding::Pcm16, DEFAULT_BACKEND_SAMPLE_RATE);
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            gateway_secret: None,
            allowed_origins: Vec::new(),
            realtime_url: None,
            realtime_deployment: None,
            realtime_api_key: None,
            realtime_api_version: DEFAULT_API_VERSION.to_string(),
            realtime_voice: DEFAULT_VOICE.to_string(),
            realtime_instructions: DEFAULT_INSTRUCTIONS.to_string(),
            realtime_input_format: backend,
            realtime_output_format: backend,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            backend_reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            default_input_format: telephony,
            default_output_format: telephony,
            frame_ms: DEFAULT_FRAME_MS,
            min_speech_ms: DEFAULT_MIN_SPEECH_MS,
            max_buffered_ms: DEFAULT_MAX_BUFFERED_MS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            bot_orchestrator_url: None,
        }
    }
}

/// Implement Drop to zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut secret) = self.gateway_secret {
            secret.zeroize();
        }
        if let Some(ref mut key) = self.realtime_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The `.env` file is loaded in `main.rs` before this is called, so its
    /// values are visible here unless an actual environment variable overrides
    /// them.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables or YAML values have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if the ingest socket requires the shared secret
    pub fn requires_gateway_secret(&self) -> bool {
        self.gateway_secret.is_some()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Backend settings handed to every session.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            url: self.realtime_url.clone(),
            deployment: self.realtime_deployment.clone(),
            api_key: self.realtime_api_key.clone(),
            api_version: self.realtime_api_version.clone(),
            voice: self.realtime_voice.clone(),
            instructions: self.realtime_instructions.clone(),
            input_format: self.realtime_input_format,
            output_format: self.realtime_output_format,
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            reconnection: ReconnectionPolicy::with_max_attempts(self.backend_reconnect_attempts),
        }
    }

    pub fn cadence_settings(&self) -> CadenceSettings {
        CadenceSettings {
            frame_ms: self.frame_ms,
            min_speech_ms: self.min_speech_ms,
            max_buffered_ms: self.max_buffered_ms,
        }
    }

    /// Formats assumed for a consumer that does not name its own.
    pub fn default_prefs(&self) -> ClientPrefs {
        ClientPrefs {
            input: self.default_input_format,
            output: self.default_output_format,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            backend: self.backend_config(),
            cadence: self.cadence_settings(),
            default_prefs: self.default_prefs(),
        }
    }
}

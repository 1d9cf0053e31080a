use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a YAML file.
/// All fields are optional to allow partial configuration. Values present here override
/// environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   tls:
///     cert_path: "/etc/voicebridge/cert.pem"
///     key_path: "/etc/voicebridge/key.pem"
///
/// security:
///   gateway_secret: "shared-secret"
///   allowed_origins:
///     - "https://connector.example.com"
///
/// backend:
///   url: "wss://example.openai.azure.com/openai/realtime"
///   deployment: "gpt-4o-realtime"
///   api_key: "your-api-key"
///   api_version: "2024-10-01-preview"
///   voice: "alloy"
///   input_encoding: "pcm16"
///   input_sample_rate: 24000
///   output_encoding: "pcm16"
///   output_sample_rate: 24000
///   response_timeout_ms: 15000
///   reconnect_attempts: 3
///
/// audio:
///   default_input_encoding: "mulaw"
///   default_input_sample_rate: 8000
///   default_output_encoding: "mulaw"
///   default_output_sample_rate: 8000
///   frame_ms: 20
///   min_speech_ms: 300
///   max_buffered_ms: 2000
///
/// heartbeat:
///   interval_secs: 30
///
/// bot:
///   orchestrator_url: "http://bots.internal:9000/launch"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub security: Option<SecurityYaml>,
    pub backend: Option<BackendYaml>,
    pub audio: Option<AudioYaml>,
    pub heartbeat: Option<HeartbeatYaml>,
    pub bot: Option<BotYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Ingest access control from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub gateway_secret: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
}

/// Realtime backend settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BackendYaml {
    pub url: Option<String>,
    pub deployment: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub input_encoding: Option<String>,
    pub input_sample_rate: Option<u32>,
    pub output_encoding: Option<String>,
    pub output_sample_rate: Option<u32>,
    pub response_timeout_ms: Option<u64>,
    pub reconnect_attempts: Option<u32>,
}

/// Consumer defaults and cadence from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub default_input_encoding: Option<String>,
    pub default_input_sample_rate: Option<u32>,
    pub default_output_encoding: Option<String>,
    pub default_output_sample_rate: Option<u32>,
    pub frame_ms: Option<u32>,
    pub min_speech_ms: Option<u64>,
    pub max_buffered_ms: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HeartbeatYaml {
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BotYaml {
    pub orchestrator_url: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid YAML.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

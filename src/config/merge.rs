//! Layering of defaults, environment variables and YAML.
//!
//! Each layer only overrides the keys it actually sets.

use std::path::PathBuf;

use super::env::{env_encoding, env_list, env_parse, env_sample_rate, env_string};
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, TlsConfig};
use crate::core::codec::{AudioEncoding, AudioFormat};

/// Build the final configuration: defaults, then env, then YAML.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();
    apply_env(&mut config)?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn set_format(format: &mut AudioFormat, encoding: Option<AudioEncoding>, rate: Option<u32>) {
    set(&mut format.encoding, encoding);
    set(&mut format.sample_rate, rate);
}

fn apply_env(config: &mut ServerConfig) -> Result<(), ConfigError> {
    set(&mut config.host, env_string("HOST"));
    set(&mut config.port, env_parse("PORT")?);

    let cert = env_string("TLS_CERT_PATH");
    let key = env_string("TLS_KEY_PATH");
    apply_tls(config, cert, key)?;

    set_opt(&mut config.gateway_secret, env_string("GATEWAY_SECRET"));
    set(&mut config.allowed_origins, env_list("ALLOWED_ORIGINS"));

    set_opt(&mut config.realtime_url, env_string("REALTIME_URL"));
    set_opt(
        &mut config.realtime_deployment,
        env_string("REALTIME_DEPLOYMENT"),
    );
    set_opt(&mut config.realtime_api_key, env_string("REALTIME_API_KEY"));
    set(
        &mut config.realtime_api_version,
        env_string("REALTIME_API_VERSION"),
    );
    set(&mut config.realtime_voice, env_string("REALTIME_VOICE"));
    set(
        &mut config.realtime_instructions,
        env_string("REALTIME_INSTRUCTIONS"),
    );
    set_format(
        &mut config.realtime_input_format,
        env_encoding("REALTIME_IN_ENCODING")?,
        env_sample_rate("REALTIME_IN_SAMPLE_RATE")?,
    );
    set_format(
        &mut config.realtime_output_format,
        env_encoding("REALTIME_OUT_ENCODING")?,
        env_sample_rate("REALTIME_OUT_SAMPLE_RATE")?,
    );
    set(
        &mut config.response_timeout_ms,
        env_parse("RESPONSE_TIMEOUT_MS")?,
    );
    set(
        &mut config.backend_reconnect_attempts,
        env_parse("BACKEND_RECONNECT_ATTEMPTS")?,
    );

    set_format(
        &mut config.default_input_format,
        env_encoding("DEFAULT_IN_ENCODING")?,
        env_sample_rate("DEFAULT_IN_SAMPLE_RATE")?,
    );
    set_format(
        &mut config.default_output_format,
        env_encoding("DEFAULT_OUT_ENCODING")?,
        env_sample_rate("DEFAULT_OUT_SAMPLE_RATE")?,
    );
    set(&mut config.frame_ms, env_parse("FRAME_MS")?);
    set(&mut config.min_speech_ms, env_parse("MIN_SPEECH_MS")?);
    set(&mut config.max_buffered_ms, env_parse("MAX_BUFFERED_MS")?);

    set(
        &mut config.heartbeat_interval_secs,
        env_parse("HEARTBEAT_INTERVAL_SECS")?,
    );
    set_opt(
        &mut config.bot_orchestrator_url,
        env_string("BOT_ORCHESTRATOR_URL"),
    );
    Ok(())
}

fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), ConfigError> {
    if let Some(server) = yaml.server {
        set(&mut config.host, server.host);
        set(&mut config.port, server.port);
        if let Some(tls) = server.tls {
            apply_tls(config, tls.cert_path, tls.key_path)?;
        }
    }

    if let Some(security) = yaml.security {
        set_opt(&mut config.gateway_secret, security.gateway_secret);
        set(&mut config.allowed_origins, security.allowed_origins);
    }

    if let Some(backend) = yaml.backend {
        set_opt(&mut config.realtime_url, backend.url);
        set_opt(&mut config.realtime_deployment, backend.deployment);
        set_opt(&mut config.realtime_api_key, backend.api_key);
        set(&mut config.realtime_api_version, backend.api_version);
        set(&mut config.realtime_voice, backend.voice);
        set(&mut config.realtime_instructions, backend.instructions);
        set_format(
            &mut config.realtime_input_format,
            yaml_encoding("backend.input_encoding", backend.input_encoding)?,
            backend.input_sample_rate,
        );
        set_format(
            &mut config.realtime_output_format,
            yaml_encoding("backend.output_encoding", backend.output_encoding)?,
            backend.output_sample_rate,
        );
        set(&mut config.response_timeout_ms, backend.response_timeout_ms);
        set(
            &mut config.backend_reconnect_attempts,
            backend.reconnect_attempts,
        );
    }

    if let Some(audio) = yaml.audio {
        set_format(
            &mut config.default_input_format,
            yaml_encoding("audio.default_input_encoding", audio.default_input_encoding)?,
            audio.default_input_sample_rate,
        );
        set_format(
            &mut config.default_output_format,
            yaml_encoding(
                "audio.default_output_encoding",
                audio.default_output_encoding,
            )?,
            audio.default_output_sample_rate,
        );
        set(&mut config.frame_ms, audio.frame_ms);
        set(&mut config.min_speech_ms, audio.min_speech_ms);
        set(&mut config.max_buffered_ms, audio.max_buffered_ms);
    }

    if let Some(heartbeat) = yaml.heartbeat {
        set(&mut config.heartbeat_interval_secs, heartbeat.interval_secs);
    }

    if let Some(bot) = yaml.bot {
        set_opt(&mut config.bot_orchestrator_url, bot.orchestrator_url);
    }
    Ok(())
}

fn yaml_encoding(key: &str, value: Option<String>) -> Result<Option<AudioEncoding>, ConfigError> {
    value
        .map(|raw| {
            raw.parse::<AudioEncoding>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        })
        .transpose()
}

/// Apply one layer's TLS paths. A layer that sets only one of the two paths
/// is an error.
fn apply_tls(
    config: &mut ServerConfig,
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<(), ConfigError> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => {
            config.tls = Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            });
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err(ConfigError::Invalid(
            "TLS requires both a certificate path and a key path".to_string(),
        )),
    }
}

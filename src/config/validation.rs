use super::{ConfigError, ServerConfig};

/// Validate a merged configuration.
///
/// # Errors
/// Returns [`ConfigError::Invalid`] for zero sample rates, a zero frame size
/// or a zero heartbeat interval.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_sample_rates(config)?;

    if config.frame_ms == 0 {
        return Err(ConfigError::Invalid(
            "frame_ms must be greater than zero".to_string(),
        ));
    }
    if config.heartbeat_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "heartbeat interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_sample_rates(config: &ServerConfig) -> Result<(), ConfigError> {
    let formats = [
        ("backend input", config.realtime_input_format),
        ("backend output", config.realtime_output_format),
        ("default input", config.default_input_format),
        ("default output", config.default_output_format),
    ];
    for (name, format) in formats {
        if format.sample_rate == 0 {
            return Err(ConfigError::Invalid(format!(
                "{name} sample rate must be greater than zero"
            )));
        }
    }
    Ok(())
}

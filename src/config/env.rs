//! Environment variable readers.
//!
//! Empty or whitespace-only variables are treated as unset.

use std::env;
use std::str::FromStr;

use super::ConfigError;
use crate::core::codec::{AudioEncoding, parse_sample_rate};

pub(super) fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Comma-separated list, entries trimmed, empties dropped.
pub(super) fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

pub(super) fn env_encoding(key: &str) -> Result<Option<AudioEncoding>, ConfigError> {
    env_parse::<AudioEncoding>(key)
}

pub(super) fn env_sample_rate(key: &str) -> Result<Option<u32>, ConfigError> {
    env_string(key)
        .map(|raw| {
            parse_sample_rate(&raw).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

//! `/start-bot` request and launch payload types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ServerConfig;
use crate::errors::app_error::AppError;

/// Body of `POST /start-bot`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartBotRequest {
    #[serde(default)]
    pub join: Option<JoinInfo>,
    /// Per-request backend overrides
    #[serde(default)]
    pub azure: Option<BackendOverrides>,
}

/// Meeting the bot should join. Both parts are passed through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinInfo {
    #[serde(default)]
    pub meeting: Value,
    #[serde(default)]
    pub attendee: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendOverrides {
    pub url: Option<String>,
    pub deployment: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub voice: Option<String>,
}

/// Backend settings the launched bot should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBackend {
    pub url: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
    pub voice: String,
}

/// Payload handed to a [`super::BotLauncher`].
#[derive(Debug, Clone, Serialize)]
pub struct LaunchRequest {
    pub join: JoinInfo,
    pub azure: ResolvedBackend,
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn pick(over: Option<&String>, base: Option<&String>) -> Option<String> {
    over.or(base)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl StartBotRequest {
    /// Validate the request and resolve backend settings against `config`.
    ///
    /// # Errors
    /// [`AppError::BadRequest`] when `join.meeting` or `join.attendee` is
    /// missing, or when URL, deployment or API key cannot be resolved.
    pub fn into_launch(self, config: &ServerConfig) -> Result<LaunchRequest, AppError> {
        let join = self
            .join
            .ok_or_else(|| AppError::BadRequest("join is required".to_string()))?;
        if !is_present(&join.meeting) {
            return Err(AppError::BadRequest("join.meeting is required".to_string()));
        }
        if !is_present(&join.attendee) {
            return Err(AppError::BadRequest(
                "join.attendee is required".to_string(),
            ));
        }

        let overrides = self.azure.unwrap_or_default();
        let url = pick(overrides.url.as_ref(), config.realtime_url.as_ref());
        let deployment = pick(
            overrides.deployment.as_ref(),
            config.realtime_deployment.as_ref(),
        );
        let api_key = pick(
            overrides.api_key.as_ref(),
            config.realtime_api_key.as_ref(),
        );

        let (Some(url), Some(deployment), Some(api_key)) = (url, deployment, api_key) else {
            return Err(AppError::BadRequest(
                "backend url, deployment and apiKey are required".to_string(),
            ));
        };

        Ok(LaunchRequest {
            join,
            azure: ResolvedBackend {
                url,
                deployment,
                api_key,
                api_version: pick(
                    overrides.api_version.as_ref(),
                    Some(&config.realtime_api_version),
                )
                .unwrap_or_else(|| config.realtime_api_version.clone()),
                voice: pick(overrides.voice.as_ref(), Some(&config.realtime_voice))
                    .unwrap_or_else(|| config.realtime_voice.clone()),
            },
        })
    }
}

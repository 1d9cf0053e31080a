//! Bot launching seam
//!
//! The gateway does not run meeting bots itself; it hands validated launch
//! requests to an external orchestrator.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::messages::LaunchRequest;

/// Timeout for a single orchestrator call
const ORCHESTRATOR_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Bot orchestrator not configured")]
    NotConfigured,
    #[error("Bot orchestrator unreachable: {0}")]
    Transport(String),
    #[error("Bot orchestrator returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Starts a meeting bot for a validated request.
#[async_trait]
pub trait BotLauncher: Send + Sync {
    /// Launch the bot and return the orchestrator's JSON response.
    async fn launch(&self, request: LaunchRequest) -> Result<Value, LaunchError>;
}

/// POSTs launch requests to the configured orchestrator URL.
pub struct HttpBotLauncher {
    client: reqwest::Client,
    orchestrator_url: Option<String>,
}

impl HttpBotLauncher {
    pub fn new(orchestrator_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ORCHESTRATOR_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            orchestrator_url,
        }
    }
}

#[async_trait]
impl BotLauncher for HttpBotLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<Value, LaunchError> {
        let url = self
            .orchestrator_url
            .as_deref()
            .ok_or(LaunchError::NotConfigured)?;

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LaunchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LaunchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LaunchError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| LaunchError::Transport(format!("invalid orchestrator response: {e}")))
    }
}

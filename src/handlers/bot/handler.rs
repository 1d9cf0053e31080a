use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use super::launcher::LaunchError;
use super::messages::StartBotRequest;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

impl From<LaunchError> for AppError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::NotConfigured => AppError::ServiceUnavailable(err.to_string()),
            LaunchError::Transport(_) | LaunchError::Rejected { .. } => {
                AppError::BadGateway(err.to_string())
            }
        }
    }
}

/// Handler for `POST /start-bot`.
///
/// Validates the join info, resolves backend credentials from the request's
/// overrides or the server configuration, and delegates to the configured
/// [`super::BotLauncher`].
pub async fn start_bot(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StartBotRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let launch = request.into_launch(&state.config)?;
    info!(deployment = %launch.azure.deployment, "Launching meeting bot");

    let result = state.bot_launcher.launch(launch).await?;
    Ok(Json(launch_response(result)))
}

/// Shape the orchestrator's reply. An `ok` it set itself is kept.
fn launch_response(result: Value) -> Value {
    match result {
        Value::Object(mut fields) => {
            fields
                .entry("ok".to_string())
                .or_insert(Value::Bool(true));
            Value::Object(fields)
        }
        Value::Null => json!({"ok": true}),
        other => json!({"ok": true, "result": other}),
    }
}

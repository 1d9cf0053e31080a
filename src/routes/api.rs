use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, bot};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP control router
///
/// - `GET /health` - liveness and active session count
/// - `POST /start-bot` - launch a meeting bot through the orchestrator
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/start-bot", post(bot::start_bot))
        .layer(TraceLayer::new_for_http())
}

//! Ingest WebSocket route configuration

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ingest::ingest_handler;
use crate::middleware::ingest_auth_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the ingest WebSocket router
///
/// # Endpoint
///
/// `GET /ingest` - WebSocket upgrade for one telephony consumer
///
/// # Authentication
///
/// The origin allow-list and gateway secret are checked by
/// [`ingest_auth_middleware`]; refused sockets are closed with 1008.
pub fn create_ingest_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingest", get(ingest_handler))
        .layer(middleware::from_fn_with_state(state, ingest_auth_middleware))
        .layer(TraceLayer::new_for_http())
}

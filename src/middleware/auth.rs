use crate::auth::authorize_ingest;
use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Header carrying the gateway secret.
pub const SECRET_HEADER: &str = "x-gateway-secret";

/// Query parameter carrying the gateway secret.
pub const SECRET_QUERY_PARAM: &str = "secret";

/// Authorization outcome for an ingest upgrade request.
///
/// The ingest handler still accepts the upgrade when access is denied so it
/// can close the socket with a policy-violation code; it must not register
/// the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestAccess {
    Granted,
    Denied(AuthError),
}

/// Extract the gateway secret from the request
///
/// Token sources, in priority order:
/// 1. `x-gateway-secret` header
/// 2. `?secret=<value>` query parameter (for connectors that cannot set headers)
fn extract_secret(request: &Request) -> Option<String> {
    if let Some(value) = request.headers().get(SECRET_HEADER)
        && let Ok(secret) = value.to_str()
    {
        tracing::debug!("Gateway secret extracted from header");
        return Some(secret.to_string());
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == SECRET_QUERY_PARAM {
                tracing::debug!("Gateway secret extracted from query parameter");
                return Some(value.into_owned());
            }
        }
    }

    None
}

/// Ingest authorization middleware
///
/// Checks the `Origin` header against the allow-list and the gateway secret
/// against the configured value, then inserts an [`IngestAccess`] into the
/// request extensions for the ingest handler.
pub async fn ingest_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let secret = extract_secret(&request);

    let access = match authorize_ingest(&state.config, origin.as_deref(), secret.as_deref()) {
        Ok(()) => IngestAccess::Granted,
        Err(e) => {
            tracing::warn!(
                path = %request.uri().path(),
                origin = origin.as_deref().unwrap_or("-"),
                error = %e,
                "Ingest authorization failed"
            );
            IngestAccess::Denied(e)
        }
    };

    request.extensions_mut().insert(access);
    next.run(request).await
}

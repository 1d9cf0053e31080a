//! Ingest socket access control.
//!
//! A socket is admitted when its `Origin` is on the allow-list (an empty list
//! admits any origin) and, when a gateway secret is configured, the presented
//! secret matches it. With a non-empty list, a request without `Origin` is
//! refused.

use subtle::ConstantTimeEq;

use crate::config::ServerConfig;
use crate::errors::auth_error::{AuthError, AuthResult};

/// Check an ingest upgrade request against the configured policy.
pub fn authorize_ingest(
    config: &ServerConfig,
    origin: Option<&str>,
    secret: Option<&str>,
) -> AuthResult<()> {
    check_origin(&config.allowed_origins, origin)?;

    if let Some(expected) = config.gateway_secret.as_deref() {
        let presented = secret.ok_or(AuthError::MissingSecret)?;
        if !secrets_match(presented, expected) {
            return Err(AuthError::InvalidSecret);
        }
    }
    Ok(())
}

fn check_origin(allowed: &[String], origin: Option<&str>) -> AuthResult<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    let Some(origin) = origin else {
        return Err(AuthError::OriginNotAllowed("<none>".to_string()));
    };
    let origin = origin.trim_end_matches('/');
    if allowed
        .iter()
        .any(|a| a == "*" || a.trim_end_matches('/').eq_ignore_ascii_case(origin))
    {
        Ok(())
    } else {
        Err(AuthError::OriginNotAllowed(origin.to_string()))
    }
}

/// Constant-time secret comparison.
fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

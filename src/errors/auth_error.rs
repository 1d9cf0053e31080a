use thiserror::Error;

/// Close code sent when an ingest socket is refused.
pub const POLICY_VIOLATION: u16 = 1008;

/// Close reason sent when an ingest socket is refused.
pub const UNAUTHORIZED_REASON: &str = "unauthorized";

/// Reasons an ingest socket is refused.
///
/// Every variant is reported to the peer the same way: close code 1008 with
/// reason `unauthorized`. The variant is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),
    #[error("Missing gateway secret")]
    MissingSecret,
    #[error("Invalid gateway secret")]
    InvalidSecret,
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn close_code(&self) -> u16 {
        POLICY_VIOLATION
    }

    pub fn close_reason(&self) -> &'static str {
        UNAUTHORIZED_REASON
    }
}

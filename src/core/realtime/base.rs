//! Error types and reconnection policy for realtime backend links.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the realtime backend.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Backend reported an error event
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

impl RealtimeError {
    /// Whether retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RealtimeError::ConnectionFailed(_)
                | RealtimeError::WebSocketError(_)
                | RealtimeError::Timeout(_)
                | RealtimeError::NotConnected
        )
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Reconnection
// =============================================================================

/// Bounded exponential backoff applied after an unexpected backend disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionPolicy {
    /// Enable automatic reconnection on connection loss.
    /// Default: true
    pub enabled: bool,

    /// Maximum number of reconnection attempts before giving up.
    /// Default: 3
    pub max_attempts: u32,

    /// Delay before the first attempt (milliseconds).
    /// Default: 500ms
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between attempts (milliseconds).
    /// Default: 8000ms
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    /// Default: 2.0
    pub backoff_multiplier: f32,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectionPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_attempts: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Default backoff with a custom attempt budget. Zero disables reconnection.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        if max_attempts == 0 {
            return Self::disabled();
        }
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        // base * multiplier^(attempt-1), capped
        let delay = base * multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Check if attempt number `attempt` (1-based) is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && attempt >= 1 && attempt <= self.max_attempts
    }
}

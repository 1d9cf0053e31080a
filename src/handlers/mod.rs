//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `bot` - Meeting bot launch endpoint
//! - `ingest` - Telephony ingest WebSocket

pub mod api;
pub mod bot;
pub mod ingest;

// Re-export commonly used handlers for convenient access
pub use bot::start_bot;
pub use ingest::ingest_handler;

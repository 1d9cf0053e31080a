pub mod auth;

// Re-export middleware functions
pub use auth::{IngestAccess, ingest_auth_middleware};

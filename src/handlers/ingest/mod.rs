//! Telephony ingest WebSocket
//!
//! # Protocol
//!
//! `GET /ingest?callId=..&enc=..&sr=..&oenc=..&osr=..&secret=..`
//!
//! ## Consumer → Gateway
//!
//! - **Binary frames**: upstream audio in the negotiated `enc`/`sr`
//! - **close**: close the session's backend link
//! - **ping**: accepted and ignored; heartbeat liveness only counts WebSocket pongs
//! - **say**: `{"type":"say","text":"..."}` speaks the text through the backend
//!
//! ## Gateway → Consumer
//!
//! - **Binary frames**: one audio clip per completed response, in `oenc`/`osr`
//! - **Ping**: heartbeat ping, answered with Pong
//! - **Close 1008 `unauthorized`**: origin or secret rejected

mod handler;
pub mod messages;

pub use handler::ingest_handler;
pub use messages::{ControlMessage, IngestParams};

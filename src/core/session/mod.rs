//! Per-call sessions.
//!
//! A session bridges one backend link to every consumer socket sharing a call
//! id. The [`SessionRegistry`] maps call ids to sessions; each session is run
//! by a single actor task owning its [`SessionState`].

pub(crate) mod actor;
mod aggregator;
mod cadence;
mod client;
mod registry;
mod state;

pub use actor::{ControlCommand, SessionHandle};
pub use aggregator::{Delivery, ResponseAggregator, render_for_clients};
pub use cadence::{
    CadenceSettings, DEFAULT_FRAME_MS, DEFAULT_MAX_BUFFERED_MS, DEFAULT_MIN_SPEECH_MS,
    UpstreamCadence,
};
pub use client::{ClientHandle, ClientId, ClientPrefs, Outbound};
pub use registry::{SessionRegistry, SessionView};
pub use state::{SessionSettings, SessionState};

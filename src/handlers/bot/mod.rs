//! Meeting bot launch endpoint

mod handler;
pub mod launcher;
pub mod messages;

pub use handler::start_bot;
pub use launcher::{BotLauncher, HttpBotLauncher, LaunchError};
pub use messages::{BackendOverrides, JoinInfo, LaunchRequest, ResolvedBackend, StartBotRequest};

//! Shared application state

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::codec::{LinearResampler, Resampler};
use crate::core::realtime::{BackendConnector, WebSocketConnector};
use crate::core::session::SessionRegistry;
use crate::handlers::bot::{BotLauncher, HttpBotLauncher};

/// State shared by every route.
pub struct AppState {
    pub config: ServerConfig,
    /// Active call sessions
    pub sessions: Arc<SessionRegistry>,
    pub bot_launcher: Arc<dyn BotLauncher>,
}

impl AppState {
    /// Build production state: WebSocket backend connector, linear resampler
    /// and HTTP bot launcher.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let bot_launcher = Arc::new(HttpBotLauncher::new(config.bot_orchestrator_url.clone()));
        Self::with_parts(
            config,
            Arc::new(WebSocketConnector::new()),
            Arc::new(LinearResampler::new()),
            bot_launcher,
        )
    }

    /// Build state from explicit collaborators.
    pub fn with_parts(
        config: ServerConfig,
        connector: Arc<dyn BackendConnector>,
        resampler: Arc<dyn Resampler>,
        bot_launcher: Arc<dyn BotLauncher>,
    ) -> Arc<Self> {
        let sessions = Arc::new(SessionRegistry::new(
            config.session_settings(),
            connector,
            resampler,
        ));
        Arc::new(Self {
            config,
            sessions,
            bot_launcher,
        })
    }
}

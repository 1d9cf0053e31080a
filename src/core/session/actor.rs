//! Session actor.
//!
//! One task per call owns the [`SessionState`] and the backend link. All
//! mutation for the call is serialized through its command channel.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::client::{ClientHandle, ClientId, ClientPrefs, Outbound};
use super::state::{SessionSettings, SessionState};
use crate::core::codec::Resampler;
use crate::core::realtime::{
    BackendConnector, BackendEvent, BackendLink, ClientEvent, RealtimeResult,
};

/// Control commands a consumer can issue for its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Close the backend link; no reconnection afterwards
    CloseUpstream,
    /// Request a response with literal instructions
    Say(String),
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Attach {
        client: ClientHandle,
        prefs: ClientPrefs,
    },
    Detach {
        client_id: ClientId,
    },
    Audio(Bytes),
    Control(ControlCommand),
    LinkResult {
        generation: u64,
        result: RealtimeResult<BackendLink>,
    },
    Shutdown,
}

/// Cloneable handle for sending work to a session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    call_id: Arc<str>,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Queue upstream audio in the consumer's wire format.
    pub fn send_audio(&self, audio: Bytes) -> bool {
        self.send(SessionCommand::Audio(audio))
    }

    pub fn control(&self, command: ControlCommand) -> bool {
        self.send(SessionCommand::Control(command))
    }

    pub fn close_upstream(&self) -> bool {
        self.control(ControlCommand::CloseUpstream)
    }

    pub fn say(&self, text: impl Into<String>) -> bool {
        self.control(ControlCommand::Say(text.into()))
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn attach(&self, client: ClientHandle, prefs: ClientPrefs) -> bool {
        self.send(SessionCommand::Attach { client, prefs })
    }

    pub(crate) fn detach(&self, client_id: ClientId) -> bool {
        self.send(SessionCommand::Detach { client_id })
    }

    pub(crate) fn shutdown(&self) -> bool {
        self.send(SessionCommand::Shutdown)
    }

    fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    /// A handle with no actor behind it; the receiver sees every command.
    #[cfg(test)]
    pub(crate) fn detached(call_id: &str) -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                call_id: Arc::from(call_id),
                tx,
            },
            rx,
        )
    }
}

/// Start the actor for `call_id` and begin connecting to the backend.
pub(crate) fn spawn_session(
    call_id: &str,
    settings: Arc<SessionSettings>,
    connector: Arc<dyn BackendConnector>,
    resampler: Arc<dyn Resampler>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = SessionActor {
        state: SessionState::new(call_id, settings, resampler),
        connector,
        self_tx: tx.downgrade(),
        link: None,
        generation: 0,
        connecting: false,
        reconnect_attempt: 0,
    };
    tokio::spawn(actor.run(rx));
    SessionHandle {
        call_id: Arc::from(call_id),
        tx,
    }
}

struct SessionActor {
    state: SessionState,
    connector: Arc<dyn BackendConnector>,
    self_tx: mpsc::WeakUnboundedSender<SessionCommand>,
    link: Option<BackendLink>,
    /// Bumped on every connect attempt and on explicit close; stale results are dropped
    generation: u64,
    /// A connect for the current generation is scheduled or running
    connecting: bool,
    /// Consecutive reconnects without a backend event in between
    reconnect_attempt: u32,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!(call_id = %self.state.call_id(), "Session started");
        self.start_connect(Duration::ZERO);

        loop {
            let deadline = self.state.response_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = next_link_event(&mut self.link) => match event {
                    Some(event) => self.handle_backend_event(event),
                    None => self.handle_link_closed(),
                },
                _ = sleep_until_deadline(deadline) => {
                    let events = self.state.on_response_timeout();
                    self.send_upstream(events);
                }
            }
        }

        if let Some(link) = self.link.take() {
            link.close();
        }
        info!(call_id = %self.state.call_id(), "Session closed");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Attach { client, prefs } => {
                debug!(call_id = %self.state.call_id(), client_id = %client.id(), "Consumer attached");
                self.state.attach(client, prefs);
                self.revive_link();
            }
            SessionCommand::Detach { client_id } => {
                let remaining = self.state.detach(client_id);
                debug!(call_id = %self.state.call_id(), %client_id, remaining, "Consumer detached");
            }
            SessionCommand::Audio(audio) => {
                let events = self.state.on_upstream_audio(&audio, Instant::now());
                self.send_upstream(events);
            }
            SessionCommand::Control(ControlCommand::CloseUpstream) => {
                info!(call_id = %self.state.call_id(), "Upstream closed by consumer");
                self.state.on_close_requested();
                self.generation += 1;
                self.connecting = false;
                if let Some(link) = self.link.take() {
                    link.close();
                }
            }
            SessionCommand::Control(ControlCommand::Say(text)) => {
                if let Some(event) = self.state.on_say(text, Instant::now()) {
                    self.send_upstream(vec![event]);
                }
            }
            SessionCommand::LinkResult { generation, result } => {
                self.handle_link_result(generation, result);
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_link_result(&mut self, generation: u64, result: RealtimeResult<BackendLink>) {
        if generation != self.generation || self.state.is_upstream_closed() {
            if let Ok(link) = result {
                link.close();
            }
            return;
        }

        self.connecting = false;
        match result {
            Ok(link) => {
                info!(call_id = %self.state.call_id(), "Backend link open");
                self.link = Some(link);
                let events = self.state.on_link_open(Instant::now());
                self.send_upstream(events);
            }
            Err(e) => {
                error!(call_id = %self.state.call_id(), "Backend connection failed: {}", e);
                if e.is_retryable() {
                    self.schedule_reconnect();
                }
            }
        }
    }

    fn handle_backend_event(&mut self, event: BackendEvent) {
        // The link only counts as healthy once the backend has spoken.
        self.reconnect_attempt = 0;
        let Some(deliveries) = self.state.on_backend_event(event) else {
            return;
        };
        for delivery in deliveries {
            if !delivery.client.send(Outbound::Audio(delivery.audio)) {
                debug!(
                    call_id = %self.state.call_id(),
                    client_id = %delivery.client.id(),
                    "Consumer gone before delivery"
                );
            }
        }
    }

    fn handle_link_closed(&mut self) {
        self.link = None;
        self.state.on_link_closed();
        if self.state.is_upstream_closed() {
            return;
        }
        warn!(call_id = %self.state.call_id(), "Backend link dropped");
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_attempt += 1;
        let policy = &self.state.settings().backend.reconnection;
        if !policy.should_retry(self.reconnect_attempt) {
            error!(
                call_id = %self.state.call_id(),
                attempts = self.reconnect_attempt - 1,
                "Backend unavailable, session degraded to silence"
            );
            return;
        }
        let delay = policy.delay_for(self.reconnect_attempt);
        info!(
            call_id = %self.state.call_id(),
            attempt = self.reconnect_attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to backend"
        );
        self.start_connect(delay);
    }

    /// A consumer joined a session with no link: start over with a fresh
    /// retry budget.
    fn revive_link(&mut self) {
        if self.link.is_some() || self.connecting || self.state.is_upstream_closed() {
            return;
        }
        info!(call_id = %self.state.call_id(), "Consumer attached to degraded session, reconnecting");
        self.reconnect_attempt = 0;
        self.start_connect(Duration::ZERO);
    }

    /// Connect in a separate task so the actor keeps draining commands.
    fn start_connect(&mut self, delay: Duration) {
        self.generation += 1;
        self.connecting = true;
        let generation = self.generation;
        let connector = self.connector.clone();
        let config = self.state.settings().backend.clone();
        let self_tx = self.self_tx.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = connector.connect(&config).await;
            if let Some(tx) = self_tx.upgrade() {
                let _ = tx.send(SessionCommand::LinkResult { generation, result });
            } else if let Ok(link) = result {
                link.close();
            }
        });
    }

    fn send_upstream(&mut self, events: Vec<ClientEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(link) = self.link.as_ref() else {
            return;
        };
        for event in events {
            let kind = event.kind();
            if let Err(e) = link.send(event) {
                warn!(call_id = %self.state.call_id(), kind, "Failed to queue backend event: {}", e);
                break;
            }
        }
    }
}

async fn next_link_event(link: &mut Option<BackendLink>) -> Option<BackendEvent> {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

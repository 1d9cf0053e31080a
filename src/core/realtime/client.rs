//! Realtime backend WebSocket client.
//!
//! A [`BackendConnector`] opens one [`BackendLink`] per session. The link is a
//! pair of channels fronting a spawned pump task that owns the socket:
//! outgoing [`ClientEvent`]s are serialized to text frames, incoming frames
//! are classified into [`BackendEvent`]s. Dropping the link (or calling
//! [`BackendLink::close`]) makes the pump send a close frame and exit. The
//! event receiver yields `None` once the socket is gone.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{RealtimeError, RealtimeResult};
use super::config::{API_KEY_HEADER, BackendConfig};
use super::messages::{BackendEvent, ClientEvent};

/// Bound on the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens links to the realtime backend.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, config: &BackendConfig) -> RealtimeResult<BackendLink>;
}

/// An open link to the realtime backend.
#[derive(Debug)]
pub struct BackendLink {
    outgoing: mpsc::UnboundedSender<ClientEvent>,
    events: mpsc::UnboundedReceiver<BackendEvent>,
    task: Option<JoinHandle<()>>,
}

impl BackendLink {
    /// Assemble a link from its channels. `task` is the pump, if any.
    pub fn new(
        outgoing: mpsc::UnboundedSender<ClientEvent>,
        events: mpsc::UnboundedReceiver<BackendEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outgoing,
            events,
            task,
        }
    }

    /// Queue an event for the backend. Does not wait for the socket.
    pub fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        self.outgoing
            .send(event)
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Next classified event, or `None` once the backend socket closed.
    pub async fn next_event(&mut self) -> Option<BackendEvent> {
        self.events.recv().await
    }

    pub fn is_open(&self) -> bool {
        !self.outgoing.is_closed() && self.task.as_ref().is_none_or(|t| !t.is_finished())
    }

    /// Close the link. The pump sends a close frame and exits.
    pub fn close(self) {
        // Dropping the sender ends the pump's outgoing loop.
        drop(self.outgoing);
    }
}

/// Connector backed by tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendConnector for WebSocketConnector {
    async fn connect(&self, config: &BackendConfig) -> RealtimeResult<BackendLink> {
        let url = config.build_ws_url()?;
        let api_key = config.api_key()?;

        let parsed =
            Url::parse(&url).map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RealtimeError::InvalidConfiguration(
                    "backend URL has no host".into(),
                ));
            }
        };

        // Build request with headers
        let request = http::Request::builder()
            .uri(&url)
            .header(API_KEY_HEADER, api_key)
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| RealtimeError::Timeout("backend handshake".into()))?
                .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(url = %redact_query(&parsed), "Connected to realtime backend");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<BackendEvent>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Handle outgoing messages
                    outgoing = outgoing_rx.recv() => {
                        let Some(event) = outgoing else {
                            debug!("Backend link released, closing socket");
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send to backend: {}", e);
                            break;
                        }
                    }

                    // Handle incoming messages
                    incoming = ws_stream.next() => {
                        let event = match incoming {
                            Some(Ok(Message::Text(text))) => match BackendEvent::from_text(&text) {
                                Ok(event) => event,
                                Err(e) => {
                                    warn!("Ignoring backend message: {}", e);
                                    continue;
                                }
                            },
                            Some(Ok(Message::Binary(data))) => BackendEvent::from_binary(data),
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                                continue;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(?frame, "Backend closed the connection");
                                break;
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                error!("Backend WebSocket error: {}", e);
                                break;
                            }
                            None => break,
                        };
                        if events_tx.send(event).is_err() {
                            // Session is gone
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }
        });

        Ok(BackendLink::new(outgoing_tx, events_rx, Some(task)))
    }
}

/// URL without its query string, for logs.
fn redact_query(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

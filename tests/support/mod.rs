//! Shared test support
//!
//! - [`MockBackend`]: a tokio-tungstenite accept loop standing in for the
//!   realtime speech backend. It records every client event and, when asked,
//!   answers each `response.create` with scripted audio deltas followed by
//!   `response.done`.
//! - [`spawn_gateway`]: the full application router served on an ephemeral
//!   port.

// Not every test binary uses every helper
#![allow(dead_code)]

use base64::prelude::*;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async, connect_async};

use voicebridge_gateway::{ServerConfig, routes, state::AppState};

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
struct MockState {
    events: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<String>>,
    uris: Mutex<Vec<String>>,
    open_connections: AtomicUsize,
    total_connections: AtomicUsize,
    reply_deltas: Mutex<Vec<Vec<u8>>>,
}

pub struct MockBackend {
    pub url: String,
    state: Arc<MockState>,
}

impl MockBackend {
    /// Start a backend that records events and never answers.
    pub async fn start() -> Self {
        Self::with_reply(Vec::new()).await
    }

    /// Start a backend that answers every `response.create` with `deltas`
    /// (raw audio, base64-encoded on the wire) and then `response.done`.
    pub async fn with_reply(deltas: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());
        *state.reply_deltas.lock().unwrap() = deltas;

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, accept_state.clone()));
            }
        });

        Self {
            url: format!("ws://{addr}/openai/realtime"),
            state,
        }
    }

    pub fn events(&self) -> Vec<Value> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.event_types().iter().filter(|t| *t == kind).count()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.state.api_keys.lock().unwrap().clone()
    }

    pub fn uris(&self) -> Vec<String> {
        self.state.uris.lock().unwrap().clone()
    }

    pub fn open_connections(&self) -> usize {
        self.state.open_connections.load(Ordering::SeqCst)
    }

    pub fn total_connections(&self) -> usize {
        self.state.total_connections.load(Ordering::SeqCst)
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<MockState>) {
    let header_state = state.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        header_state
            .uris
            .lock()
            .unwrap()
            .push(request.uri().to_string());
        if let Some(key) = request.headers().get("api-key").and_then(|v| v.to_str().ok()) {
            header_state.api_keys.lock().unwrap().push(key.to_string());
        }
        Ok(response)
    };
    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    state.total_connections.fetch_add(1, Ordering::SeqCst);
    state.open_connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws.split();
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(event) = serde_json::from_str::<Value>(text.as_str()) else {
                    continue;
                };
                let is_create = event["type"] == "response.create";
                state.events.lock().unwrap().push(event);

                if is_create {
                    let deltas = state.reply_deltas.lock().unwrap().clone();
                    if deltas.is_empty() {
                        continue;
                    }
                    for delta in deltas {
                        let frame = json!({
                            "type": "response.audio.delta",
                            "delta": BASE64_STANDARD.encode(&delta),
                        });
                        if write.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    let done = json!({"type": "response.done"});
                    let _ = write.send(Message::Text(done.to_string().into())).await;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
    state.open_connections.fetch_sub(1, Ordering::SeqCst);
}

/// Gateway configuration pointing at `backend_url`.
pub fn test_config(backend_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.realtime_url = Some(backend_url.to_string());
    config.realtime_deployment = Some("test-deployment".to_string());
    config.realtime_api_key = Some("test-key".to_string());
    config.backend_reconnect_attempts = 0;
    config
}

/// Serve the gateway on an ephemeral port.
pub async fn spawn_gateway(config: ServerConfig) -> (SocketAddr, Arc<AppState>) {
    let state = AppState::new(config);
    let app = routes::create_app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

pub async fn connect_ingest(addr: SocketAddr, query: &str) -> ClientSocket {
    let (ws, _) = connect_async(format!("ws://{addr}/ingest?{query}"))
        .await
        .unwrap();
    ws
}

/// Poll `condition` until it holds or `within` elapses.
pub async fn wait_until<F>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Next binary frame from the gateway, skipping control frames.
pub async fn next_binary(ws: &mut ClientSocket, within: Duration) -> Option<Vec<u8>> {
    let deadline = Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Binary(data)))) => return Some(data.to_vec()),
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => {
                return None;
            }
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// `n` μ-law frames of 20 ms at 8 kHz (160 bytes each) carrying a low tone.
pub fn mulaw_frames(n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            (0..160)
                .map(|j| if (i * 160 + j) % 16 < 8 { 0x9F } else { 0x1F })
                .collect()
        })
        .collect()
}

/// PCM16 little-endian silence of `samples` samples.
pub fn pcm16_silence(samples: usize) -> Vec<u8> {
    vec![0u8; samples * 2]
}

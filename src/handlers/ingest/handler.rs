//! Ingest WebSocket handler
//!
//! One socket per telephony consumer. The reader loop feeds the session actor;
//! a writer task drains the consumer's outbound queue.

use axum::{
    Extension,
    extract::{
        Query, State,
        rejection::QueryRejection,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::session::{ClientHandle, ClientId, ClientPrefs, Outbound, SessionHandle};
use crate::errors::app_error::AppError;
use crate::errors::auth_error::AuthError;
use crate::middleware::IngestAccess;
use crate::state::AppState;

use super::messages::{ControlMessage, IngestParams};

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Ingest WebSocket handler
///
/// Upgrades the connection, then either closes it with a policy violation
/// (when the auth middleware denied access) or attaches it to the session
/// named by `callId`. The query is only parsed for authorized requests, so a
/// denied request is always closed with a policy violation.
pub async fn ingest_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    query: Result<Query<IngestParams>, QueryRejection>,
    Extension(access): Extension<IngestAccess>,
) -> Response {
    let ws = ws
        .max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE);

    match access {
        IngestAccess::Denied(reason) => ws.on_upgrade(move |socket| reject_socket(socket, reason)),
        IngestAccess::Granted => {
            let params = match query {
                Ok(Query(params)) => params,
                Err(e) => return AppError::BadRequest(e.body_text()).into_response(),
            };
            let call_id = params.call_id();
            let prefs = params.prefs(state.sessions.settings().default_prefs);
            info!(call_id = %call_id, input = %prefs.input, output = %prefs.output, "Ingest connection upgrade requested");
            ws.on_upgrade(move |socket| handle_ingest_socket(socket, state, call_id, prefs))
        }
    }
}

async fn reject_socket(mut socket: WebSocket, reason: AuthError) {
    debug!(error = %reason, "Closing unauthorized ingest socket");
    let frame = CloseFrame {
        code: reason.close_code(),
        reason: reason.close_reason().into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Failed to send policy close: {}", e);
    }
}

/// Handle an accepted ingest connection until it closes or is terminated.
async fn handle_ingest_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    call_id: String,
    prefs: ClientPrefs,
) {
    let (client, outbound_rx) = ClientHandle::new(prefs.output);
    let client_id = client.id();
    let session = app_state
        .sessions
        .attach(&call_id, client.clone(), prefs);
    info!(call_id = %call_id, client_id = %client_id, "Ingest consumer attached");

    let (sender, mut receiver) = socket.split();
    let cancel = CancellationToken::new();
    let writer = tokio::spawn(run_writer(sender, outbound_rx, cancel.clone()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(call_id = %call_id, client_id = %client_id, "Ingest socket terminated");
                break;
            }
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_message(msg, &session, &client) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(call_id = %call_id, client_id = %client_id, "Ingest WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!(call_id = %call_id, client_id = %client_id, "Ingest stream ended");
                        break;
                    }
                }
            }
        }
    }

    detach(&app_state, &call_id, client_id);
    cancel.cancel();
    if let Err(e) = writer.await {
        error!("Ingest writer task failed: {}", e);
    }
    info!(call_id = %call_id, client_id = %client_id, "Ingest connection closed");
}

fn detach(app_state: &AppState, call_id: &str, client_id: ClientId) {
    if app_state.sessions.detach(call_id, client_id) {
        debug!(call_id, "Session torn down with its last consumer");
    }
}

/// Drain the consumer's outbound queue into the socket.
async fn run_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let result = match frame {
            Outbound::Audio(audio) => sender.send(Message::Binary(audio)).await,
            Outbound::Ping => sender.send(Message::Ping(Bytes::new())).await,
            Outbound::Close { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                    debug!("Failed to send close frame: {}", e);
                }
                cancel.cancel();
                break;
            }
            Outbound::Terminate => {
                // No close handshake; the reader observes the token and exits.
                cancel.cancel();
                break;
            }
        };

        if let Err(e) = result {
            debug!("Failed to write to ingest socket: {}", e);
            cancel.cancel();
            break;
        }
    }
}

/// Process one inbound frame. Returns false when the socket should close.
fn process_message(msg: Message, session: &SessionHandle, client: &ClientHandle) -> bool {
    match msg {
        Message::Binary(data) => {
            if !data.is_empty() && !session.send_audio(data) {
                warn!(call_id = session.call_id(), "Session gone, dropping audio");
            }
            true
        }
        Message::Text(text) => {
            match ControlMessage::parse(text.as_str()) {
                Some(ControlMessage::Close) => {
                    info!(call_id = session.call_id(), "Consumer requested upstream close");
                    session.close_upstream();
                }
                // Heartbeat liveness only counts WebSocket pongs.
                Some(ControlMessage::Ping) => {}
                Some(ControlMessage::Say { text }) => {
                    debug!(call_id = session.call_id(), chars = text.len(), "Say requested");
                    session.say(text);
                }
                None => {
                    debug!(call_id = session.call_id(), "Ignoring malformed control message");
                }
            }
            true
        }
        Message::Pong(_) => {
            client.mark_alive();
            true
        }
        Message::Ping(_) => true,
        Message::Close(_) => {
            debug!(call_id = session.call_id(), "Ingest close received");
            false
        }
    }
}

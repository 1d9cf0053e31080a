//! Telephony-side consumer handles.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::codec::AudioFormat;

/// Identifies one ingest socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audio formats a consumer negotiated on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientPrefs {
    /// Format of binary frames the consumer sends
    pub input: AudioFormat,
    /// Format the consumer wants back
    pub output: AudioFormat,
}

/// Frames queued for an ingest socket's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One downstream audio clip
    Audio(Bytes),
    /// Liveness check
    Ping,
    /// Close with a code and reason
    Close { code: u16, reason: String },
    /// Drop the socket without a close handshake
    Terminate,
}

/// Cloneable handle to one consumer socket.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    output: AudioFormat,
    tx: mpsc::UnboundedSender<Outbound>,
    alive: Arc<AtomicBool>,
}

impl ClientHandle {
    /// Create a handle and the receiver its writer task drains.
    pub fn new(output: AudioFormat) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: ClientId::new(),
            output,
            tx,
            alive: Arc::new(AtomicBool::new(true)),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output
    }

    /// Queue a frame. Returns false when the socket is gone.
    pub fn send(&self, frame: Outbound) -> bool {
        self.tx.send(frame).is_ok()
    }

    /// Record a pong (or any other proof of life).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Clear the liveness flag, returning whether it was set.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

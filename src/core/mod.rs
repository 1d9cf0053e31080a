pub mod codec;
pub mod heartbeat;
pub mod realtime;
pub mod session;

// Re-export commonly used types for convenience
pub use codec::{AudioEncoding, AudioFormat, CodecError, LinearResampler, Resampler};

pub use realtime::{
    BackendConfig, BackendConnector, BackendEvent, BackendLink, ClientEvent, RealtimeError,
    RealtimeResult, ReconnectionPolicy, WebSocketConnector,
};

pub use session::{
    ClientHandle, ClientId, ClientPrefs, ControlCommand, Outbound, SessionHandle,
    SessionRegistry, SessionSettings,
};

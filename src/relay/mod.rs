//! Connection manager for the control socket
//!
//! 1. [`server`] - accepts TCP clients and upgrades them to WebSockets
//! 2. [`session`] - per-client state machine, outbound queue and heartbeat timer
//! 3. [`registry`] - bookkeeping of every open client
//! 4. [`dispatcher`] - single owner of control state and registry
//!
//! # Protocol
//!
//! ```text
//! server -> client   "<throttle>,<steering>"   once per state change
//! client -> server   "ping"                    answered with "pong"
//! ```
//!
//! A client that stays silent for longer than the liveness window is closed
//! on its next heartbeat tick. The server never pings on its own.

pub mod command;
pub mod dispatcher;
pub mod registry;
pub mod server;
pub mod session;

pub use command::{ClientId, Command, DispatcherHandle};
pub use dispatcher::Dispatcher;
pub use registry::{ClientConnection, ConnectionRegistry};
pub use server::RelayServer;
pub use session::CloseReason;

use std::net::SocketAddr;
use std::time::Duration;

/// Heartbeat timing shared by sessions and the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// How often each session reports a tick
    pub tick_interval: Duration,
    /// Maximum silence before a client is closed
    pub liveness_window: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            liveness_window: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("WebSocket handshake not completed within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("WebSocket handshake cancelled")]
    HandshakeCancelled,

    #[error("Channel error: {0}")]
    ChannelError(String),
}

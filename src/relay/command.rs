use super::RelayError;
use crate::input::{GamepadFrame, KeyCode};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

pub type ClientId = u64;

/// Queue feeding one client's socket task
pub type Outbound = mpsc::UnboundedSender<Message>;

/// Everything the dispatcher reacts to.
///
/// Timestamps are taken by the sender so heartbeat bookkeeping does not depend
/// on how long a command waited in the queue.
#[derive(Debug)]
pub enum Command {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    GamepadFrame(GamepadFrame),
    ClientConnected {
        id: ClientId,
        peer: SocketAddr,
        outbound: Outbound,
        cancel: CancellationToken,
        at: Instant,
    },
    ClientPing {
        id: ClientId,
        at: Instant,
    },
    HeartbeatTick {
        id: ClientId,
        at: Instant,
    },
    ClientClosed {
        id: ClientId,
    },
}

/// Cloneable sending side of the dispatcher's command channel.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, command: Command) -> Result<(), RelayError> {
        self.tx
            .send(command)
            .await
            .map_err(|e| RelayError::ChannelError(e.to_string()))
    }

    /// For callers that must not wait, like the UI frame loop.
    pub fn try_send(&self, command: Command) -> Result<(), RelayError> {
        self.tx
            .try_send(command)
            .map_err(|e| RelayError::ChannelError(e.to_string()))
    }

    /// For callers on plain OS threads, like the gamepad poller.
    pub fn blocking_send(&self, command: Command) -> Result<(), RelayError> {
        self.tx
            .blocking_send(command)
            .map_err(|e| RelayError::ChannelError(e.to_string()))
    }

    pub fn key_down(&self, key: KeyCode) -> Result<(), RelayError> {
        self.try_send(Command::KeyDown(key))
    }

    pub fn key_up(&self, key: KeyCode) -> Result<(), RelayError> {
        self.try_send(Command::KeyUp(key))
    }
}

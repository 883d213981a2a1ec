use super::command::{ClientId, Outbound};
use crate::control::ControlFrame;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Bookkeeping for one accepted client.
#[derive(Debug)]
pub struct ClientConnection {
    pub peer: SocketAddr,
    outbound: Outbound,
    cancel: CancellationToken,
    last_heartbeat: Instant,
    is_alive: bool,
    connected_at: DateTime<Local>,
}

impl ClientConnection {
    pub fn new(
        peer: SocketAddr,
        outbound: Outbound,
        cancel: CancellationToken,
        at: Instant,
    ) -> Self {
        Self {
            peer,
            outbound,
            cancel,
            last_heartbeat: at,
            is_alive: true,
            connected_at: Local::now(),
        }
    }

    /// Records a liveness signal.
    pub fn refresh(&mut self, at: Instant) {
        self.last_heartbeat = at;
        self.is_alive = true;
    }

    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    /// True once more than `window` has passed since the last liveness signal.
    pub fn is_stale(&self, at: Instant, window: Duration) -> bool {
        at.saturating_duration_since(self.last_heartbeat) > window
    }

    /// Queues a message. Fails only when the socket task is already gone.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(message).is_ok()
    }

    /// Stops the heartbeat timer and asks the socket task to close.
    fn terminate(&mut self) {
        self.is_alive = false;
        self.cancel.cancel();
    }
}

/// All currently registered clients.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<ClientId, ClientConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&id)
    }

    pub fn insert(&mut self, id: ClientId, connection: ClientConnection) {
        info!(
            "Client {} ({}) connected at {}",
            id,
            connection.peer,
            connection.connected_at.format("%H:%M:%S.%3f")
        );
        if let Some(mut previous) = self.clients.insert(id, connection) {
            previous.terminate();
        }
    }

    /// Removes a client and cancels its timer. Unknown ids return `None`, so a
    /// second teardown of the same client is a no-op.
    pub fn remove(&mut self, id: ClientId) -> Option<ClientConnection> {
        let mut connection = self.clients.remove(&id)?;
        connection.terminate();
        let duration = Local::now() - connection.connected_at;
        info!(
            "Client {} ({}) removed after {}s",
            id,
            connection.peer,
            duration.num_seconds()
        );
        Some(connection)
    }

    /// Sends one serialized frame to every registered client, returns how many
    /// queues accepted it.
    pub fn broadcast(&self, frame: &ControlFrame) -> usize {
        let text = frame.to_string();
        let mut delivered = 0;
        for (id, connection) in &self.clients {
            if connection.send(Message::Text(text.clone())) {
                delivered += 1;
            } else {
                debug!("Skipping client {}, socket task already gone", id);
            }
        }
        debug!("Broadcast {} to {} clients", text, delivered);
        delivered
    }

    /// Terminates and drops every client.
    pub fn close_all(&mut self) -> usize {
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in &ids {
            self.remove(*id);
        }
        ids.len()
    }
}

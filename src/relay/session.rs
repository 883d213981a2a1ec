//! Per-client socket lifecycle
//!
//! Each accepted TCP stream is driven through a small state machine:
//!
//! ```text
//! Connecting ──handshake──► Open ──close / error / cancel──► Closed
//! ```
//!
//! While `Open`, the session owns the WebSocket stream: it drains the
//! outbound queue the dispatcher writes into, forwards `"ping"` payloads as
//! [`Command::ClientPing`] and runs a heartbeat timer that reports a
//! [`Command::HeartbeatTick`] every tick. The dispatcher decides about
//! eviction; the session only reacts to its cancellation token.

use super::command::{ClientId, Command, DispatcherHandle};
use super::{HeartbeatSettings, RelayError};
use futures_util::{SinkExt, StreamExt};
use statum::{machine, state};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const PING: &[u8] = b"ping";

/// Why a session left the `Open` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the client
    ClientClosed,
    /// Reading or writing the socket failed
    TransportError,
    /// Heartbeat eviction or shutdown
    Cancelled,
    /// The dispatcher is gone
    DispatcherGone,
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

#[machine]
#[derive(Debug)]
pub struct ClientSession<S: SessionState> {
    id: ClientId,
    peer: SocketAddr,
    dispatcher: DispatcherHandle,
    cancel: CancellationToken,
    heartbeat: HeartbeatSettings,
}

impl<S: SessionState> ClientSession<S> {
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl ClientSession<Connecting> {
    pub fn create(
        id: ClientId,
        peer: SocketAddr,
        dispatcher: DispatcherHandle,
        cancel: CancellationToken,
        heartbeat: HeartbeatSettings,
    ) -> Self {
        debug!("Creating session {} for {}", id, peer);
        Self::new(id, peer, dispatcher, cancel, heartbeat)
    }

    /// Upgrades the raw stream to a WebSocket and moves to `Open`.
    ///
    /// A peer gets one liveness window to finish the upgrade. Cancellation or
    /// timeout drops the stream, which closes the TCP connection.
    pub async fn handshake(
        self,
        stream: TcpStream,
    ) -> Result<(ClientSession<Open>, WebSocketStream<TcpStream>), RelayError> {
        let window = self.heartbeat.liveness_window;
        let upgrade = tokio::time::timeout(window, accept_async(stream));
        let ws = tokio::select! {
            _ = self.cancel.cancelled() => return Err(RelayError::HandshakeCancelled),
            upgraded = upgrade => match upgraded {
                Ok(ws) => ws?,
                Err(_) => return Err(RelayError::HandshakeTimeout(window)),
            },
        };
        debug!("Session {} completed WebSocket handshake", self.id);
        Ok((self.transition(), ws))
    }
}

impl ClientSession<Open> {
    /// Registers with the dispatcher and pumps messages until the connection
    /// ends for any reason.
    pub async fn serve(self, ws: WebSocketStream<TcpStream>) -> (ClientSession<Closed>, CloseReason) {
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let registered = self
            .dispatcher
            .send(Command::ClientConnected {
                id: self.id,
                peer: self.peer,
                outbound,
                cancel: self.cancel.clone(),
                at: Instant::now(),
            })
            .await;
        if let Err(e) = registered {
            warn!("Session {} could not register: {}", self.id, e);
            return (self.transition(), CloseReason::DispatcherGone);
        }

        let _timer = spawn_heartbeat(
            self.id,
            self.dispatcher.clone(),
            self.cancel.clone(),
            self.heartbeat,
        );

        let (mut sink, mut stream) = ws.split();
        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break CloseReason::Cancelled,
                Some(message) = outbound_rx.recv() => {
                    if let Err(e) = sink.send(message).await {
                        error!("Session {} send failed: {}", self.id, e);
                        break CloseReason::TransportError;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !self.on_payload(text.as_bytes()).await {
                            break CloseReason::DispatcherGone;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if !self.on_payload(&data).await {
                            break CloseReason::DispatcherGone;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Session {} receive failed: {}", self.id, e);
                        break CloseReason::TransportError;
                    }
                },
            }
        };

        if let Err(e) = sink.close().await {
            debug!("Session {} close handshake incomplete: {}", self.id, e);
        }
        (self.transition(), reason)
    }

    /// Forwards pings; everything else is ignored. Returns false once the
    /// dispatcher is unreachable.
    async fn on_payload(&self, payload: &[u8]) -> bool {
        if payload != PING {
            debug!("Session {} ignoring {} byte payload", self.id, payload.len());
            return true;
        }
        self.dispatcher
            .send(Command::ClientPing {
                id: self.id,
                at: Instant::now(),
            })
            .await
            .is_ok()
    }
}

impl ClientSession<Closed> {
    /// Stops the heartbeat timer and tells the dispatcher the client is gone.
    pub async fn finish(self, reason: CloseReason) {
        self.cancel.cancel();
        info!("Session {} ({}) closed: {:?}", self.id, self.peer, reason);
        if reason != CloseReason::DispatcherGone {
            if let Err(e) = self.dispatcher.send(Command::ClientClosed { id: self.id }).await {
                debug!("Session {} close not delivered: {}", self.id, e);
            }
        }
    }
}

/// Drives one accepted stream from handshake to teardown.
pub async fn run_session(session: ClientSession<Connecting>, stream: TcpStream) {
    let id = session.id();
    match session.handshake(stream).await {
        Ok((open, ws)) => {
            let (closed, reason) = open.serve(ws).await;
            closed.finish(reason).await;
        }
        Err(e) => warn!("Session {} handshake failed: {}", id, e),
    }
}

/// Recurring liveness check bound to the session's cancellation token.
fn spawn_heartbeat(
    id: ClientId,
    dispatcher: DispatcherHandle,
    cancel: CancellationToken,
    heartbeat: HeartbeatSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(
            Instant::now() + heartbeat.tick_interval,
            heartbeat.tick_interval,
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let tick = Command::HeartbeatTick { id, at: Instant::now() };
                    if dispatcher.send(tick).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Heartbeat timer for session {} stopped", id);
    })
}

use super::command::{ClientId, DispatcherHandle};
use super::session::{run_session, ClientSession};
use super::{HeartbeatSettings, RelayError};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Accept loop for the control socket.
pub struct RelayServer {
    listener: TcpListener,
    dispatcher: DispatcherHandle,
    heartbeat: HeartbeatSettings,
    shutdown: CancellationToken,
    next_id: ClientId,
}

impl RelayServer {
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: DispatcherHandle,
        heartbeat: HeartbeatSettings,
        shutdown: CancellationToken,
    ) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;
        info!("Relay listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            dispatcher,
            heartbeat,
            shutdown,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until shutdown. Each client gets its own task and a
    /// child of the shutdown token, so shutdown tears every session down.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = self.next_id;
                        self.next_id += 1;
                        debug!("Accepted TCP connection {} from {}", id, peer);
                        let session = ClientSession::create(
                            id,
                            peer,
                            self.dispatcher.clone(),
                            self.shutdown.child_token(),
                            self.heartbeat,
                        );
                        tokio::spawn(run_session(session, stream));
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }
        info!("Relay listener closed");
    }
}

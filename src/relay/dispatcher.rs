//! Dispatcher - single owner of the control state and client registry
//!
//! Every producer (socket tasks, heartbeat timers, the gamepad poller, the
//! operator console) talks to the dispatcher through one command channel. The
//! dispatcher applies each command to completion, mutation and broadcast
//! included, before it looks at the next one, so no client can ever observe a
//! half-updated state.
//!
//! ```text
//! keyboard ─┐
//! gamepad  ─┼─[Command]─► Dispatcher ──► ConnectionRegistry ──► clients
//! sockets  ─┤                 │
//! timers   ─┘                 └──► StatusNotifier / state watch
//! ```

use super::command::{ClientId, Command, DispatcherHandle};
use super::registry::{ClientConnection, ConnectionRegistry};
use super::HeartbeatSettings;
use crate::control::{ControlFrame, ControlState};
use crate::input::{InputAggregator, KeyEdge};
use crate::mapping::MappingSnapshot;
use crate::status::StatusNotifier;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Same headroom as the controller event queue
pub const COMMAND_BUFFER: usize = 1000;

pub struct Dispatcher {
    commands: mpsc::Receiver<Command>,
    aggregator: InputAggregator,
    registry: ConnectionRegistry,
    mapping: watch::Receiver<MappingSnapshot>,
    notifier: Box<dyn StatusNotifier>,
    state_tx: watch::Sender<ControlState>,
    heartbeat: HeartbeatSettings,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        mapping: watch::Receiver<MappingSnapshot>,
        notifier: Box<dyn StatusNotifier>,
        heartbeat: HeartbeatSettings,
        shutdown: CancellationToken,
    ) -> (Self, DispatcherHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let state = ControlState::default();
        let (state_tx, _) = watch::channel(state);
        debug!("Created dispatcher with command buffer {}", COMMAND_BUFFER);

        let dispatcher = Self {
            commands,
            aggregator: InputAggregator::new(state),
            registry: ConnectionRegistry::new(),
            mapping,
            notifier,
            state_tx,
            heartbeat,
            shutdown,
        };
        (dispatcher, DispatcherHandle::new(tx))
    }

    /// Latest control state, for display.
    pub fn subscribe_state(&self) -> watch::Receiver<ControlState> {
        self.state_tx.subscribe()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn state(&self) -> &ControlState {
        self.aggregator.state()
    }

    /// Runs until shutdown or until every handle is dropped, then closes all
    /// remaining clients.
    pub async fn run(mut self) {
        info!("Dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Dispatcher shutting down");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        warn!("All dispatcher handles dropped");
                        break;
                    }
                },
            }
        }
        let closed = self.registry.close_all();
        if closed > 0 {
            info!("Closed {} clients on shutdown", closed);
            self.notify_status();
        }
    }

    /// Applies one command.
    pub fn handle(&mut self, command: Command) {
        match command {
            Command::KeyDown(key) => {
                let frame = self.aggregator.key(&key, KeyEdge::Pressed);
                self.publish(frame);
            }
            Command::KeyUp(key) => {
                let frame = self.aggregator.key(&key, KeyEdge::Released);
                self.publish(frame);
            }
            Command::GamepadFrame(frame) => {
                let snapshot = self.mapping.borrow().clone();
                if let Some(frame) = self.aggregator.gamepad(&frame, snapshot.as_deref()) {
                    self.publish(frame);
                }
            }
            Command::ClientConnected {
                id,
                peer,
                outbound,
                cancel,
                at,
            } => {
                self.registry
                    .insert(id, ClientConnection::new(peer, outbound, cancel, at));
                self.notify_status();
            }
            Command::ClientPing { id, at } => self.on_ping(id, at),
            Command::HeartbeatTick { id, at } => self.on_heartbeat_tick(id, at),
            Command::ClientClosed { id } => {
                if self.registry.remove(id).is_some() {
                    self.notify_status();
                } else {
                    debug!("Client {} already torn down", id);
                }
            }
        }
    }

    fn publish(&mut self, frame: ControlFrame) {
        self.state_tx.send_replace(*self.aggregator.state());
        self.registry.broadcast(&frame);
    }

    fn on_ping(&mut self, id: ClientId, at: tokio::time::Instant) {
        let Some(connection) = self.registry.get_mut(id) else {
            debug!("Ping from unknown client {}", id);
            return;
        };
        connection.refresh(at);
        if !connection.send(Message::Text("pong".to_string())) {
            debug!("Could not queue pong for client {}", id);
        }
    }

    fn on_heartbeat_tick(&mut self, id: ClientId, at: tokio::time::Instant) {
        let window = self.heartbeat.liveness_window;
        let stale = self
            .registry
            .get_mut(id)
            .is_some_and(|connection| connection.is_stale(at, window));
        if stale {
            info!(
                "Client {} missed its heartbeat for more than {}ms, terminating",
                id,
                self.heartbeat.liveness_window.as_millis()
            );
            self.registry.remove(id);
            self.notify_status();
        }
    }

    fn notify_status(&mut self) {
        let connected = !self.registry.is_empty();
        info!(
            "Connection status: {} ({} clients)",
            if connected { "connected" } else { "disconnected" },
            self.registry.len()
        );
        self.notifier.notify(connected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::gamepad::tests::frame;
    use crate::input::KeyCode;
    use crate::mapping::ButtonMapping;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Harness {
        dispatcher: Dispatcher,
        status: mpsc::UnboundedReceiver<bool>,
        mapping: watch::Sender<MappingSnapshot>,
        start: Instant,
    }

    struct FakeClient {
        rx: mpsc::UnboundedReceiver<Message>,
        cancel: CancellationToken,
    }

    impl FakeClient {
        fn drain(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                if let Message::Text(text) = message {
                    out.push(text);
                }
            }
            out
        }
    }

    fn harness() -> Harness {
        let (mapping, mapping_rx) = watch::channel(None);
        let (status_tx, status) = mpsc::unbounded_channel();
        let (dispatcher, _handle) = Dispatcher::new(
            mapping_rx,
            Box::new(status_tx),
            HeartbeatSettings::default(),
            CancellationToken::new(),
        );
        Harness {
            dispatcher,
            status,
            mapping,
            start: Instant::now(),
        }
    }

    impl Harness {
        fn connect(&mut self, id: ClientId) -> FakeClient {
            let (outbound, rx) = mpsc::unbounded_channel();
            let cancel = CancellationToken::new();
            self.dispatcher.handle(Command::ClientConnected {
                id,
                peer: "127.0.0.1:50000".parse().unwrap(),
                outbound,
                cancel: cancel.clone(),
                at: self.start,
            });
            FakeClient { rx, cancel }
        }

        fn at(&self, millis: u64) -> Instant {
            self.start + Duration::from_millis(millis)
        }

        fn statuses(&mut self) -> Vec<bool> {
            let mut out = Vec::new();
            while let Ok(status) = self.status.try_recv() {
                out.push(status);
            }
            out
        }
    }

    #[test]
    fn no_frame_until_first_change_then_arrow_up_scenario() {
        let mut h = harness();
        let mut client = h.connect(1);
        assert!(client.drain().is_empty());

        h.dispatcher.handle(Command::KeyDown(KeyCode::ArrowUp));
        assert_eq!(client.drain(), vec!["120,90"]);

        h.dispatcher.handle(Command::KeyUp(KeyCode::ArrowUp));
        assert_eq!(client.drain(), vec!["90,90"]);
    }

    #[test]
    fn every_key_event_is_broadcast() {
        let mut h = harness();
        let mut client = h.connect(1);
        h.dispatcher.handle(Command::KeyDown(KeyCode::from_code("KeyA")));
        h.dispatcher.handle(Command::KeyUp(KeyCode::ArrowLeft));
        assert_eq!(client.drain(), vec!["90,90", "90,90"]);
    }

    #[test]
    fn fan_out_reaches_every_open_client_and_no_closed_one() {
        let mut h = harness();
        let mut clients: Vec<FakeClient> = (1..=4).map(|id| h.connect(id)).collect();
        h.dispatcher.handle(Command::ClientClosed { id: 3 });

        h.dispatcher.handle(Command::KeyDown(KeyCode::ArrowLeft));

        for (index, client) in clients.iter_mut().enumerate() {
            let received = client.drain();
            if index == 2 {
                assert!(received.is_empty());
                assert!(client.cancel.is_cancelled());
            } else {
                assert_eq!(received, vec!["90,110"]);
            }
        }
    }

    #[test]
    fn ping_gets_exactly_one_pong_each_time() {
        let mut h = harness();
        let mut client = h.connect(7);
        for i in 1..=3 {
            let at = h.at(i * 1000);
            h.dispatcher.handle(Command::ClientPing { id: 7, at });
            assert_eq!(
                h.dispatcher
                    .registry
                    .get_mut(7)
                    .map(|c| c.last_heartbeat()),
                Some(at)
            );
        }
        assert_eq!(client.drain(), vec!["pong", "pong", "pong"]);
    }

    #[test]
    fn silent_client_is_evicted_after_the_window() {
        let mut h = harness();
        let client = h.connect(1);
        assert_eq!(h.statuses(), vec![true]);

        for tick in 1..=5 {
            h.dispatcher.handle(Command::HeartbeatTick {
                id: 1,
                at: h.at(tick * 1000),
            });
        }
        assert!(h.dispatcher.registry().contains(1));
        assert!(!client.cancel.is_cancelled());

        h.dispatcher.handle(Command::HeartbeatTick {
            id: 1,
            at: h.at(6000),
        });
        assert!(!h.dispatcher.registry().contains(1));
        assert!(client.cancel.is_cancelled());
        assert_eq!(h.statuses(), vec![false]);

        // the socket task reports its close afterwards; nothing happens twice
        h.dispatcher.handle(Command::ClientClosed { id: 1 });
        assert!(h.statuses().is_empty());
    }

    #[test]
    fn tick_only_evicts_the_ticking_client() {
        let mut h = harness();
        let first = h.connect(1);
        let second = h.connect(2);
        h.statuses();

        // both are stale at 6 s, but only client 1's timer has fired
        h.dispatcher.handle(Command::HeartbeatTick {
            id: 1,
            at: h.at(6000),
        });
        assert!(!h.dispatcher.registry().contains(1));
        assert!(first.cancel.is_cancelled());
        assert!(h.dispatcher.registry().contains(2));
        assert!(!second.cancel.is_cancelled());
        assert_eq!(h.statuses(), vec![true]);

        h.dispatcher.handle(Command::HeartbeatTick {
            id: 2,
            at: h.at(6000),
        });
        assert!(h.dispatcher.registry().is_empty());
        assert_eq!(h.statuses(), vec![false]);
    }

    #[test]
    fn tick_for_unknown_client_is_ignored() {
        let mut h = harness();
        let _client = h.connect(1);
        h.statuses();
        h.dispatcher.handle(Command::HeartbeatTick {
            id: 42,
            at: h.at(60_000),
        });
        assert!(h.dispatcher.registry().contains(1));
        assert!(h.statuses().is_empty());
    }

    #[test]
    fn client_pinging_every_four_seconds_survives() {
        let mut h = harness();
        let client = h.connect(1);
        for second in 1..=60u64 {
            if second % 4 == 0 {
                h.dispatcher.handle(Command::ClientPing {
                    id: 1,
                    at: h.at(second * 1000),
                });
            }
            h.dispatcher.handle(Command::HeartbeatTick {
                id: 1,
                at: h.at(second * 1000),
            });
        }
        assert!(h.dispatcher.registry().contains(1));
        assert!(!client.cancel.is_cancelled());
    }

    #[test]
    fn status_follows_registry_size() {
        let mut h = harness();
        let _a = h.connect(1);
        let _b = h.connect(2);
        h.dispatcher.handle(Command::ClientClosed { id: 1 });
        h.dispatcher.handle(Command::ClientClosed { id: 2 });
        assert_eq!(h.statuses(), vec![true, true, true, false]);
    }

    #[test]
    fn gamepad_frames_wait_for_a_mapping() {
        let mut h = harness();
        let mut client = h.connect(1);

        h.dispatcher
            .handle(Command::GamepadFrame(frame(1.0, 0.0, -1.0, false, false)));
        assert!(client.drain().is_empty());

        h.mapping
            .send_replace(Some(Arc::new(ButtonMapping::default())));
        h.dispatcher
            .handle(Command::GamepadFrame(frame(1.0, 0.0, -1.0, false, false)));
        assert_eq!(client.drain(), vec!["160,170"]);
    }

    #[test]
    fn unchanged_gamepad_frames_are_still_sent() {
        let mut h = harness();
        h.mapping
            .send_replace(Some(Arc::new(ButtonMapping::default())));
        let mut client = h.connect(1);
        let idle = frame(0.0, 0.0, 0.0, false, false);
        for _ in 0..3 {
            h.dispatcher.handle(Command::GamepadFrame(idle.clone()));
        }
        assert_eq!(client.drain(), vec!["90,85", "90,85", "90,85"]);
    }

    #[test]
    fn hot_swapped_mapping_applies_to_the_next_frame() {
        let mut h = harness();
        h.mapping
            .send_replace(Some(Arc::new(ButtonMapping::default())));
        let mut client = h.connect(1);

        // throttle on button 7 in the default layout
        let pad = frame(1.0, 0.0, 0.0, false, false);
        h.dispatcher.handle(Command::GamepadFrame(pad.clone()));

        h.mapping.send_replace(Some(Arc::new(ButtonMapping {
            throttle_index: 0,
            ..ButtonMapping::default()
        })));
        h.dispatcher.handle(Command::GamepadFrame(pad));
        assert_eq!(client.drain(), vec!["160,85", "90,85"]);
    }

    #[test]
    fn state_watch_sees_every_change() {
        let mut h = harness();
        let state = h.dispatcher.subscribe_state();
        h.dispatcher.handle(Command::KeyDown(KeyCode::ArrowDown));
        assert_eq!(state.borrow().throttle, 60);
        assert_eq!(h.dispatcher.state().throttle, 60);
    }

    #[tokio::test]
    async fn shutdown_closes_every_client() {
        let (_mapping, mapping_rx) = watch::channel(None);
        let (status_tx, mut status) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let (dispatcher, handle) = Dispatcher::new(
            mapping_rx,
            Box::new(status_tx),
            HeartbeatSettings::default(),
            shutdown.clone(),
        );
        let task = tokio::spawn(dispatcher.run());

        let (outbound, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        handle
            .send(Command::ClientConnected {
                id: 1,
                peer: "127.0.0.1:50001".parse().unwrap(),
                outbound,
                cancel: cancel.clone(),
                at: Instant::now(),
            })
            .await
            .unwrap();
        assert_eq!(status.recv().await, Some(true));

        shutdown.cancel();
        task.await.unwrap();
        assert!(cancel.is_cancelled());
        assert_eq!(status.recv().await, Some(false));
    }
}

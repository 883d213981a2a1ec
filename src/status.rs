//! Connection status sink
//!
//! The dispatcher reports `true` ("at least one client is connected") or
//! `false` every time a client joins or leaves. It never reads the value back.

use tokio::sync::{mpsc, watch};
use tracing::debug;

pub trait StatusNotifier: Send + 'static {
    fn notify(&mut self, connected: bool);
}

/// Feeds the operator console, latest value wins.
impl StatusNotifier for watch::Sender<bool> {
    fn notify(&mut self, connected: bool) {
        self.send_replace(connected);
    }
}

/// Keeps every transition, in order.
impl StatusNotifier for mpsc::UnboundedSender<bool> {
    fn notify(&mut self, connected: bool) {
        if self.send(connected).is_err() {
            debug!("Status receiver dropped, transition to {} not delivered", connected);
        }
    }
}

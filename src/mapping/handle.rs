use super::{ButtonMapping, MappingStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// `None` until the first load finished
pub type MappingSnapshot = Option<Arc<ButtonMapping>>;

/// Owner of the live mapping snapshot.
///
/// Readers hold a `watch::Receiver` and borrow the whole `Arc` per read, writers
/// publish a complete replacement. Nothing is ever mutated in place.
#[derive(Debug, Clone)]
pub struct MappingHandle {
    store: MappingStore,
    snapshot: Arc<watch::Sender<MappingSnapshot>>,
}

impl MappingHandle {
    pub fn new(store: MappingStore) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            store,
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MappingSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn current(&self) -> MappingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Publishes a new snapshot without touching the file.
    pub fn replace(&self, mapping: ButtonMapping) {
        info!("Activating gamepad mapping: {:?}", mapping);
        self.snapshot.send_replace(Some(Arc::new(mapping)));
    }

    /// Loads from disk (or defaults) and publishes the result.
    pub async fn reload(&self) -> ButtonMapping {
        let mapping = self.store.load().await;
        self.replace(mapping);
        mapping
    }

    /// Persists `mapping` and, only if that worked, makes it the live snapshot.
    ///
    /// Returns `false` on failure; the previous snapshot stays active.
    pub async fn save_and_swap(&self, mapping: ButtonMapping) -> bool {
        match self.store.save(&mapping).await {
            Ok(()) => {
                self.replace(mapping);
                true
            }
            Err(e) => {
                error!("Failed to save gamepad mapping: {}", e);
                false
            }
        }
    }
}

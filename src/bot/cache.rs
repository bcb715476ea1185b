//! Listener-fed race snapshot cache

use crate::races::{Listener, RaceSnapshot, SnapshotSource};
use crate::shutdown::Shutdown;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Holds the latest snapshot delivered to a monitor listener, so the
/// dispatcher can read race state without touching the monitor.
#[derive(Debug, Default)]
pub struct RaceCache {
    snapshot: RwLock<RaceSnapshot>,
}

impl RaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, snapshot: RaceSnapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Copy snapshots from the listener into the cache until shutdown or
    /// until the listener is removed
    pub async fn follow(&self, mut listener: Listener, mut shutdown: Shutdown) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = listener.recv() => match next {
                    Some(snapshot) => {
                        debug!(races = snapshot.len(), "Race cache updated");
                        self.replace(snapshot);
                    }
                    None => break,
                },
            }
        }
    }
}

impl SnapshotSource for RaceCache {
    fn current(&self) -> RaceSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

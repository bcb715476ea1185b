//! Live race state for a category
//!
//! This module owns the snapshot of races currently open in the monitored
//! category and the presets those races are played with.

pub mod monitor;
pub mod presets;

pub use monitor::{BroadcastReport, Listener, ListenerId, Monitor, MonitorConfig};
pub use presets::{preset_in_info, Preset, PRESETS};

use crate::types::RaceData;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Immutable list of races as fetched at one point in time.
///
/// Cloning is cheap; every reader holds the same backing slice.
#[derive(Debug, Clone)]
pub struct RaceSnapshot {
    races: Arc<[RaceData]>,
    fetched_at: Option<DateTime<Utc>>,
}

impl RaceSnapshot {
    /// The snapshot served before any fetch has succeeded
    pub fn empty() -> Self {
        Self {
            races: Arc::from(Vec::new()),
            fetched_at: None,
        }
    }

    pub fn new(races: Vec<RaceData>) -> Self {
        Self {
            races: Arc::from(races),
            fetched_at: Some(current_timestamp()),
        }
    }

    pub fn races(&self) -> &[RaceData] {
        &self.races
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// First race, in snapshot order, that lists the user as an entrant
    pub fn race_with_entrant(&self, racetime_id: &str) -> Option<&RaceData> {
        self.races.iter().find(|race| race.has_entrant(racetime_id))
    }
}

impl Default for RaceSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for RaceSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.races == other.races
    }
}

/// Anything that can hand out the latest race snapshot
pub trait SnapshotSource: Send + Sync {
    fn current(&self) -> RaceSnapshot;
}

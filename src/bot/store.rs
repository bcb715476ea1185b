//! Broadcaster lookup
//!
//! The bot only ever reads broadcaster records. The in-memory store is
//! populated once at startup, usually from a TOML file.

use crate::error::{BotError, Result};
use crate::types::{BroadcasterRecord, TwitchId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Read-only access to broadcaster records
pub trait BroadcasterStore: Send + Sync {
    /// Record for a chat-platform channel owner
    fn find_by_twitch_id(&self, twitch_id: &str) -> Result<Option<BroadcasterRecord>>;

    /// Broadcasters whose channels the bot should join
    fn find_active(&self) -> Result<Vec<BroadcasterRecord>>;
}

/// File layout: a `[[broadcasters]]` array of tables
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BroadcasterFile {
    #[serde(default)]
    pub broadcasters: Vec<BroadcasterRecord>,
}

/// Broadcaster records held in memory, keyed by chat-platform id
#[derive(Debug, Default)]
pub struct InMemoryBroadcasterStore {
    records: RwLock<HashMap<TwitchId, BroadcasterRecord>>,
}

impl InMemoryBroadcasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; chat-platform ids must be unique
    pub fn from_records(records: Vec<BroadcasterRecord>) -> Result<Self> {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            if record.twitch_id.is_empty() {
                return Err(BotError::Store {
                    message: format!("broadcaster {} has no twitch_id", record.twitch_name),
                }
                .into());
            }
            if map.contains_key(&record.twitch_id) {
                return Err(BotError::Store {
                    message: format!("duplicate twitch_id {}", record.twitch_id),
                }
                .into());
            }
            map.insert(record.twitch_id.clone(), record);
        }

        Ok(Self {
            records: RwLock::new(map),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: BroadcasterFile = toml::from_str(content).map_err(|e| BotError::Store {
            message: format!("Failed to parse broadcasters file: {}", e),
        })?;
        Self::from_records(file.broadcasters)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BotError::Store {
            message: format!("Failed to read broadcasters file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<TwitchId, BroadcasterRecord>>> {
        self.records.read().map_err(|_| {
            BotError::InternalError {
                message: "Failed to acquire broadcasters read lock".to_string(),
            }
            .into()
        })
    }
}

impl BroadcasterStore for InMemoryBroadcasterStore {
    fn find_by_twitch_id(&self, twitch_id: &str) -> Result<Option<BroadcasterRecord>> {
        Ok(self.read()?.get(twitch_id).cloned())
    }

    fn find_active(&self) -> Result<Vec<BroadcasterRecord>> {
        let mut active: Vec<BroadcasterRecord> =
            self.read()?.values().filter(|r| r.active).cloned().collect();
        active.sort_by(|a, b| a.twitch_name.cmp(&b.twitch_name));
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
[[broadcasters]]
twitch_id = "1001"
racetime_id = "rt-streamer"
twitch_name = "streamer"
twitch_display_name = "Streamer"
active = true

[[broadcasters]]
twitch_id = "1002"
twitch_name = "lurker"
twitch_display_name = "Lurker"
"#;

    #[test]
    fn test_load_from_toml() {
        let store = InMemoryBroadcasterStore::from_toml_str(FILE).unwrap();
        assert_eq!(store.len(), 2);

        let record = store.find_by_twitch_id("1001").unwrap().unwrap();
        assert_eq!(record.racetime_id, "rt-streamer");
        assert!(store.find_by_twitch_id("9999").unwrap().is_none());

        let lurker = store.find_by_twitch_id("1002").unwrap().unwrap();
        assert!(!lurker.active);
        assert!(lurker.racetime_id.is_empty());
    }

    #[test]
    fn test_find_active() {
        let store = InMemoryBroadcasterStore::from_toml_str(FILE).unwrap();
        let active = store.find_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].twitch_name, "streamer");
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let duplicated = format!("{}\n{}", FILE, FILE);
        let err = InMemoryBroadcasterStore::from_toml_str(&duplicated).unwrap_err();
        assert!(err.to_string().contains("duplicate twitch_id"));
    }

    #[test]
    fn test_invalid_file() {
        assert!(InMemoryBroadcasterStore::from_toml_str("broadcasters = 5").is_err());
        assert!(InMemoryBroadcasterStore::from_file("/nonexistent/broadcasters.toml").is_err());
        assert!(InMemoryBroadcasterStore::from_toml_str("").unwrap().is_empty());
    }
}

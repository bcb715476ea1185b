//! Common types used throughout the race bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Racing-service user identifier
pub type RacetimeId = String;

/// Chat-platform user identifier
pub type TwitchId = String;

/// Status block shared by races and entrants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub verbose_value: String,
    #[serde(default)]
    pub help_text: String,
}

/// Race goal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom: bool,
}

/// A racing-service user as embedded in race and category payloads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RacetimeUser {
    pub id: RacetimeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub twitch_name: Option<String>,
    #[serde(default)]
    pub twitch_display_name: Option<String>,
    #[serde(default)]
    pub twitch_channel: Option<String>,
}

/// A participant in a race
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub user: RacetimeUser,
    #[serde(default)]
    pub status: Status,
}

impl Entrant {
    /// Linked chat-platform login, if the entrant has one
    pub fn linked_chat_name(&self) -> Option<&str> {
        self.user
            .twitch_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    /// Name to show in chat: the linked chat display name, else the racing name
    pub fn display_name(&self) -> &str {
        if self.linked_chat_name().is_some() {
            if let Some(display) = self
                .user
                .twitch_display_name
                .as_deref()
                .filter(|name| !name.is_empty())
            {
                return display;
            }
        }
        &self.user.name
    }
}

/// Live data for a single race
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceData {
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub data_url: String,
    #[serde(default)]
    pub goal: Goal,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub entrants_count: u32,
    #[serde(default)]
    pub entrants_count_finished: u32,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entrants: Vec<Entrant>,
}

impl RaceData {
    /// Whether the given racing identity is one of this race's entrants
    pub fn has_entrant(&self, racetime_id: &str) -> bool {
        self.entrants.iter().any(|e| e.user.id == racetime_id)
    }
}

/// Category detail response, carrying the currently open races
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub data_url: String,
    #[serde(default)]
    pub current_races: Vec<RaceData>,
}

/// A broadcaster the bot operates for, linked to a racing identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcasterRecord {
    pub twitch_id: TwitchId,
    #[serde(default)]
    pub racetime_id: RacetimeId,
    pub twitch_name: String,
    pub twitch_display_name: String,
    #[serde(default)]
    pub active: bool,
}

/// An inbound chat-platform message addressed to a joined channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Channel login the message was posted in (without `#`)
    pub channel: String,
    /// Chat-platform id of the channel owner
    pub room_id: TwitchId,
    /// Chat-platform id of the author
    pub author_id: TwitchId,
    pub author_name: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(id: &str, name: &str, twitch: Option<(&str, &str)>) -> Entrant {
        Entrant {
            user: RacetimeUser {
                id: id.to_string(),
                name: name.to_string(),
                full_name: format!("{}#0001", name),
                twitch_name: twitch.map(|(login, _)| login.to_string()),
                twitch_display_name: twitch.map(|(_, display)| display.to_string()),
                twitch_channel: None,
            },
            status: Status::default(),
        }
    }

    #[test]
    fn test_display_name_prefers_linked_chat_name() {
        let linked = entrant("a", "racer", Some(("racer_tv", "Racer_TV")));
        assert_eq!(linked.display_name(), "Racer_TV");

        let unlinked = entrant("b", "plain", None);
        assert_eq!(unlinked.display_name(), "plain");
        assert_eq!(unlinked.linked_chat_name(), None);
    }

    #[test]
    fn test_empty_twitch_name_counts_as_unlinked() {
        let e = entrant("c", "ghost", Some(("", "Ghost")));
        assert_eq!(e.linked_chat_name(), None);
        assert_eq!(e.display_name(), "ghost");
    }

    #[test]
    fn test_race_data_deserializes_with_nulls() {
        let json = r#"{
            "name": "tww/clever-link-1234",
            "status": {"value": "in_progress", "verbose_value": "In progress", "help_text": "Race is in progress"},
            "goal": {"name": "Standard Race", "custom": false},
            "info": "s4 | MS45LjAAQQ | Seed Hash: Foo Bar Baz",
            "entrants_count": 1,
            "opened_at": "2021-03-01T18:00:00.000Z",
            "started_at": null,
            "entrants": [
                {"user": {"id": "abc", "name": "colfra", "twitch_name": null, "twitch_display_name": null}}
            ]
        }"#;

        let race: RaceData = serde_json::from_str(json).unwrap();
        assert_eq!(race.goal.name, "Standard Race");
        assert!(race.started_at.is_none());
        assert!(race.has_entrant("abc"));
        assert!(!race.has_entrant("xyz"));
    }
}

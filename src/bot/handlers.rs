//! Reply text for each chat command
//!
//! Handlers are pure functions of the broadcaster and race. They never fail;
//! every unanswerable case has a fixed reply.

use super::commands::Command;
use crate::races::presets::{is_standard_goal, preset_in_info, Preset};
use crate::types::{BroadcasterRecord, RaceData};

/// Multi-stream viewer used by the multi command
pub const MULTI_STREAM_URL: &str = "https://multitwitch.tv";

/// Label that follows the permalink field in race info
pub const SEED_HASH_MARKER: &str = "Seed Hash:";

/// Field separator in race info
pub const INFO_DELIMITER: &str = " | ";

pub const PERMA_NOT_FOUND: &str = "Permalink has not yet been generated or cannot be found";

/// Fixed values handlers interpolate into replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySettings {
    pub prefix: String,
    pub racetime_url: String,
    pub multi_stream_url: String,
    pub seed_hash_marker: String,
    pub info_delimiter: String,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            prefix: super::commands::DEFAULT_PREFIX.to_string(),
            racetime_url: "https://racetime.gg".to_string(),
            multi_stream_url: MULTI_STREAM_URL.to_string(),
            seed_hash_marker: SEED_HASH_MARKER.to_string(),
            info_delimiter: INFO_DELIMITER.to_string(),
        }
    }
}

pub fn help() -> String {
    let names: Vec<&str> = Command::ADVERTISED.iter().map(|c| c.literal()).collect();
    format!("commands: {}", names.join(", "))
}

pub fn not_in_race(broadcaster: &BroadcasterRecord) -> String {
    format!("{} is not currently in a race", broadcaster.twitch_display_name)
}

pub fn custom_category(broadcaster: &BroadcasterRecord) -> String {
    format!(
        "{} is playing a custom race category",
        broadcaster.twitch_display_name
    )
}

pub fn no_other_entrants(broadcaster: &BroadcasterRecord) -> String {
    format!(
        "There are currently no other entrants in race with {}",
        broadcaster.twitch_display_name
    )
}

/// Preset of a standard-goal race, if its info names one
fn standard_preset(race: &RaceData) -> Option<&'static Preset> {
    if !is_standard_goal(&race.goal.name) {
        return None;
    }
    preset_in_info(&race.info)
}

pub fn settings(broadcaster: &BroadcasterRecord, race: &RaceData) -> String {
    match standard_preset(race) {
        Some(preset) => format!("{}: {}", preset.name, preset.description),
        None => custom_category(broadcaster),
    }
}

pub fn race(broadcaster: &BroadcasterRecord, race: &RaceData, prefix: &str) -> String {
    match standard_preset(race) {
        Some(preset) => format!(
            "{} is playing {} ({} settings)",
            broadcaster.twitch_display_name, preset.name, prefix
        ),
        None => custom_category(broadcaster),
    }
}

pub fn example_perma(broadcaster: &BroadcasterRecord, race: &RaceData) -> String {
    match standard_preset(race) {
        Some(preset) => format!("example permalink: {}", preset.example_perma),
        None => custom_category(broadcaster),
    }
}

/// Everyone in the race except the broadcaster
pub fn vs(broadcaster: &BroadcasterRecord, race: &RaceData) -> String {
    let opponents: Vec<&str> = race
        .entrants
        .iter()
        .filter(|e| e.user.id != broadcaster.racetime_id)
        .map(|e| e.display_name())
        .collect();

    if opponents.is_empty() {
        return no_other_entrants(broadcaster);
    }

    format!(
        "{} is currently racing against: {}",
        broadcaster.twitch_display_name,
        opponents.join(", ")
    )
}

/// Multi-stream link for every entrant with a linked chat account
pub fn multi(broadcaster: &BroadcasterRecord, race: &RaceData, multi_stream_url: &str) -> String {
    let channels: Vec<&str> = race
        .entrants
        .iter()
        .filter_map(|e| e.linked_chat_name())
        .collect();

    if channels.is_empty() {
        return no_other_entrants(broadcaster);
    }

    format!(
        "{}/{}",
        multi_stream_url.trim_end_matches('/'),
        channels.join("/")
    )
}

/// Field between the two delimiters that precede the marker
pub fn extract_perma<'a>(info: &'a str, marker: &str, delimiter: &str) -> Option<&'a str> {
    let marker_at = info.find(marker)?;
    let before = info[..marker_at].strip_suffix(delimiter)?;
    let start = before.rfind(delimiter)? + delimiter.len();
    let field = before[start..].trim();
    (!field.is_empty()).then_some(field)
}

pub fn perma(broadcaster: &BroadcasterRecord, race: &RaceData, settings: &ReplySettings) -> String {
    if !is_standard_goal(&race.goal.name) {
        return custom_category(broadcaster);
    }

    match extract_perma(&race.info, &settings.seed_hash_marker, &settings.info_delimiter) {
        Some(perma) => perma.to_string(),
        None => PERMA_NOT_FOUND.to_string(),
    }
}

pub fn link(race: &RaceData, racetime_url: &str) -> String {
    format!("{}/{}", racetime_url.trim_end_matches('/'), race.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entrant, Goal, RacetimeUser};

    fn broadcaster() -> BroadcasterRecord {
        BroadcasterRecord {
            twitch_id: "1001".to_string(),
            racetime_id: "rt-streamer".to_string(),
            twitch_name: "streamer".to_string(),
            twitch_display_name: "Streamer".to_string(),
            active: true,
        }
    }

    fn entrant(id: &str, name: &str, twitch: Option<(&str, &str)>) -> Entrant {
        Entrant {
            user: RacetimeUser {
                id: id.to_string(),
                name: name.to_string(),
                twitch_name: twitch.map(|(login, _)| login.to_string()),
                twitch_display_name: twitch.map(|(_, display)| display.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn standard_race(info: &str) -> RaceData {
        RaceData {
            name: "twwr/salty-rupee-4821".to_string(),
            goal: Goal {
                name: "Standard Race".to_string(),
                custom: false,
            },
            info: info.to_string(),
            entrants: vec![
                entrant("rt-streamer", "streamer", Some(("streamer", "Streamer"))),
                entrant("rt-a", "alpha", Some(("alpha_tv", "Alpha_TV"))),
                entrant("rt-b", "bravo", None),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_help_lists_advertised_commands() {
        assert_eq!(
            help(),
            "commands: settings, race, vs, link, exampleperma, perma, multi, help"
        );
    }

    #[test]
    fn test_settings_and_race_for_known_preset() {
        let race_data = standard_race("S4 | MS45LjAAQQAFCyIAD3DAAgAAAAAAAQAA | Seed Hash: Foo Bar Baz");
        assert_eq!(
            settings(&broadcaster(), &race_data),
            "s4: 3 DRM, Puzzle Secret Caves, Island Puzzles, Free Gifts, Mail, Submarines & Misc."
        );
        assert_eq!(
            race(&broadcaster(), &race_data, "!twwr"),
            "Streamer is playing s4 (!twwr settings)"
        );
        assert_eq!(
            example_perma(&broadcaster(), &race_data),
            "example permalink: MS45LjAAQQAFCyIAD3DAAgAAAAAAAQAA"
        );
    }

    #[test]
    fn test_custom_goal_or_unknown_preset() {
        let mut race_data = standard_race("s4");
        race_data.goal.name = "Beat the game".to_string();
        assert_eq!(
            settings(&broadcaster(), &race_data),
            "Streamer is playing a custom race category"
        );
        assert_eq!(
            perma(&broadcaster(), &race_data, &ReplySettings::default()),
            "Streamer is playing a custom race category"
        );

        let unknown = standard_race("mystery settings");
        assert_eq!(
            race(&broadcaster(), &unknown, "!twwr"),
            "Streamer is playing a custom race category"
        );
    }

    #[test]
    fn test_vs_excludes_broadcaster() {
        let race_data = standard_race("s4");
        assert_eq!(
            vs(&broadcaster(), &race_data),
            "Streamer is currently racing against: Alpha_TV, bravo"
        );
    }

    #[test]
    fn test_vs_alone_in_race() {
        let mut race_data = standard_race("s4");
        race_data.entrants.truncate(1);
        assert_eq!(
            vs(&broadcaster(), &race_data),
            "There are currently no other entrants in race with Streamer"
        );
    }

    #[test]
    fn test_multi_skips_unlinked_entrants() {
        let race_data = standard_race("s4");
        assert_eq!(
            multi(&broadcaster(), &race_data, MULTI_STREAM_URL),
            "https://multitwitch.tv/streamer/alpha_tv"
        );

        let mut unlinked = standard_race("s4");
        unlinked.entrants = vec![entrant("rt-b", "bravo", None)];
        assert_eq!(
            multi(&broadcaster(), &unlinked, MULTI_STREAM_URL),
            "There are currently no other entrants in race with Streamer"
        );
    }

    #[test]
    fn test_extract_perma() {
        assert_eq!(
            extract_perma("abc | ABCDEF123 | Seed Hash: XYZ", SEED_HASH_MARKER, INFO_DELIMITER),
            Some("ABCDEF123")
        );
        assert_eq!(extract_perma("abc | ABCDEF123", SEED_HASH_MARKER, INFO_DELIMITER), None);
        assert_eq!(
            extract_perma("ABCDEF123 | Seed Hash: XYZ", SEED_HASH_MARKER, INFO_DELIMITER),
            None
        );
        assert_eq!(
            extract_perma("abc | ABCDEF123 Seed Hash: XYZ", SEED_HASH_MARKER, INFO_DELIMITER),
            None
        );
        assert_eq!(extract_perma("abc |  | Seed Hash: XYZ", SEED_HASH_MARKER, INFO_DELIMITER), None);
    }

    #[test]
    fn test_perma_reply() {
        let settings = ReplySettings::default();
        let found = standard_race("s4 | MS45LjAAQQAFCyIAD3DAAgAAAAAAAQAA | Seed Hash: Foo Bar Baz");
        assert_eq!(
            perma(&broadcaster(), &found, &settings),
            "MS45LjAAQQAFCyIAD3DAAgAAAAAAAQAA"
        );

        let pending = standard_race("s4 | rolling seed...");
        assert_eq!(perma(&broadcaster(), &pending, &settings), PERMA_NOT_FOUND);
    }

    #[test]
    fn test_link() {
        let race_data = standard_race("s4");
        assert_eq!(
            link(&race_data, "https://racetime.gg/"),
            "https://racetime.gg/twwr/salty-rupee-4821"
        );
    }
}

//! Test fixtures and fake collaborators for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use racetime_bot::bot::{InMemoryBroadcasterStore, ReplySettings};
use racetime_bot::error::{BotError, Result};
use racetime_bot::racetime::RaceSource;
use racetime_bot::twitch::ChatClient;
use racetime_bot::types::{
    BroadcasterRecord, ChatMessage, Entrant, Goal, RaceData, RacetimeUser,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const STREAMER_TWITCH_ID: &str = "1001";
pub const STREAMER_RACETIME_ID: &str = "rt-streamer";
pub const IDLE_TWITCH_ID: &str = "1002";

/// Race source that replays scripted responses, then repeats the last one
#[derive(Debug, Default)]
pub struct StaticRaceSource {
    responses: Mutex<VecDeque<std::result::Result<Vec<RaceData>, String>>>,
    last: Mutex<Vec<RaceData>>,
    calls: Mutex<usize>,
}

impl StaticRaceSource {
    pub fn new(races: Vec<RaceData>) -> Self {
        let source = Self::default();
        source.push_ok(races);
        source
    }

    pub fn push_ok(&self, races: Vec<RaceData>) {
        self.responses.lock().unwrap().push_back(Ok(races));
    }

    pub fn push_err(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RaceSource for StaticRaceSource {
    async fn current_races(&self, category: &str) -> Result<Vec<RaceData>> {
        *self.calls.lock().unwrap() += 1;

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(races)) => {
                *self.last.lock().unwrap() = races.clone();
                Ok(races)
            }
            Some(Err(message)) => Err(BotError::RaceFetchFailed {
                category: category.to_string(),
                message,
            }
            .into()),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Chat client that records every message it is asked to post
#[derive(Debug, Default)]
pub struct RecordingChatClient {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChatClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl ChatClient for RecordingChatClient {
    async fn say(&self, channel: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

pub fn create_entrant(id: &str, name: &str, twitch: Option<(&str, &str)>) -> Entrant {
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

pub fn create_race(name: &str, goal: &str, info: &str, entrants: Vec<Entrant>) -> RaceData {
    RaceData {
        name: name.to_string(),
        goal: Goal {
            name: goal.to_string(),
            custom: false,
        },
        info: info.to_string(),
        entrants_count: entrants.len() as u32,
        entrants,
        ..Default::default()
    }
}

/// A standard race with the streamer and two opponents, one without a
/// linked chat account
pub fn create_sample_race() -> RaceData {
    create_race(
        "twwr/clever-wizard-1234",
        "Standard Race",
        "S4 | MS45LjAAQQAFCyIAD3DAAgAAAAAAAQAA | Seed Hash: Gohma Moblin Bokoblin",
        vec![
            create_entrant(STREAMER_RACETIME_ID, "streamer", Some(("streamer", "Streamer"))),
            create_entrant("rt-rival", "rival", Some(("rivalttv", "RivalTTV"))),
            create_entrant("rt-offline", "offline_racer", None),
        ],
    )
}

pub fn create_sample_broadcasters() -> Vec<BroadcasterRecord> {
    vec![
        BroadcasterRecord {
            twitch_id: STREAMER_TWITCH_ID.to_string(),
            racetime_id: STREAMER_RACETIME_ID.to_string(),
            twitch_name: "streamer".to_string(),
            twitch_display_name: "Streamer".to_string(),
            active: true,
        },
        BroadcasterRecord {
            twitch_id: IDLE_TWITCH_ID.to_string(),
            racetime_id: "rt-idle".to_string(),
            twitch_name: "idle".to_string(),
            twitch_display_name: "Idle".to_string(),
            active: true,
        },
    ]
}

pub fn create_sample_store() -> Arc<InMemoryBroadcasterStore> {
    Arc::new(InMemoryBroadcasterStore::from_records(create_sample_broadcasters()).unwrap())
}

pub fn create_settings() -> ReplySettings {
    ReplySettings {
        racetime_url: "https://racetime.gg".to_string(),
        ..Default::default()
    }
}

/// A chat line posted in the given broadcaster's channel
pub fn chat(room_id: &str, author_id: &str, text: &str) -> ChatMessage {
    let channel = if room_id == IDLE_TWITCH_ID { "idle" } else { "streamer" };
    ChatMessage {
        channel: channel.to_string(),
        room_id: room_id.to_string(),
        author_id: author_id.to_string(),
        author_name: format!("user{}", author_id),
        text: text.to_string(),
    }
}

//! Chat command vocabulary

use crate::lexer::{KeywordTable, LexError};
use std::fmt;

/// Command prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "!twwr";

/// Keyword kinds recognized in chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Prefix,
    Settings,
    Race,
    Vs,
    Leaderboard,
    Link,
    ExamplePerma,
    Perma,
    Restream,
    Multi,
    Help,
}

impl Command {
    /// Every command, in keyword table order
    pub const ALL: [Command; 12] = [
        Command::Play,
        Command::Prefix,
        Command::Settings,
        Command::Race,
        Command::Vs,
        Command::Leaderboard,
        Command::Link,
        Command::ExamplePerma,
        Command::Perma,
        Command::Restream,
        Command::Multi,
        Command::Help,
    ];

    /// Commands advertised by the help reply, in the order they are listed
    pub const ADVERTISED: [Command; 8] = [
        Command::Settings,
        Command::Race,
        Command::Vs,
        Command::Link,
        Command::ExamplePerma,
        Command::Perma,
        Command::Multi,
        Command::Help,
    ];

    /// Keyword literal. The prefix literal comes from configuration.
    pub fn literal(&self) -> &'static str {
        match self {
            Command::Play => "!play",
            Command::Prefix => DEFAULT_PREFIX,
            Command::Settings => "settings",
            Command::Race => "race",
            Command::Vs => "vs",
            Command::Leaderboard => "leaderboard",
            Command::Link => "link",
            Command::ExamplePerma => "exampleperma",
            Command::Perma => "perma",
            Command::Restream => "restream",
            Command::Multi => "multi",
            Command::Help => "help",
        }
    }

    /// Only the broadcaster may trigger these
    pub fn is_privileged(&self) -> bool {
        matches!(self, Command::Play)
    }

    /// Whether answering needs the broadcaster's current race
    pub fn is_race_scoped(&self) -> bool {
        matches!(
            self,
            Command::Settings
                | Command::Race
                | Command::Vs
                | Command::Link
                | Command::ExamplePerma
                | Command::Perma
                | Command::Multi
        )
    }

    /// Build the keyword table for a bot answering to `prefix`
    pub fn keyword_table(prefix: &str) -> Result<KeywordTable<Command>, LexError> {
        KeywordTable::new(Self::ALL.iter().map(|command| {
            let literal = match command {
                Command::Prefix => prefix,
                other => other.literal(),
            };
            (*command, literal)
        }))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Prefix => "prefix",
            Command::Play => "play",
            other => other.literal(),
        };
        write!(f, "{}", name)
    }
}

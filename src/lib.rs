//! racetime-bot - chat bot for racetime.gg categories
//!
//! This crate polls a race category for live races, answers chat commands
//! about the race a broadcaster is in, and can relay a race room's chat.

pub mod bot;
pub mod config;
pub mod error;
pub mod lexer;
pub mod metrics;
pub mod races;
pub mod racetime;
pub mod service;
pub mod shutdown;
pub mod twitch;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{BotError, Result};
pub use types::*;

// Re-export key components
pub use bot::{BroadcasterStore, ChatBot, Dispatcher};
pub use races::{Monitor, RaceSnapshot, SnapshotSource};
pub use racetime::{ChatRelay, RaceSource, RacetimeClient};
pub use twitch::ChatClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

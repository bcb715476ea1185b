//! Chat command bot
//!
//! Commands arrive as chat messages, are tokenized against the bot's keyword
//! table and answered from the broadcaster's current race.

pub mod cache;
pub mod commands;
pub mod dispatcher;
pub mod handlers;
pub mod store;

pub use cache::RaceCache;
pub use commands::{Command, DEFAULT_PREFIX};
pub use dispatcher::{ChatBot, Dispatcher};
pub use handlers::ReplySettings;
pub use store::{BroadcasterStore, InMemoryBroadcasterStore};

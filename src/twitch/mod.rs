//! Chat platform integration

pub mod client;
pub mod irc;

pub use client::{connect, IrcConfig, IrcConnection, TwitchIrcClient, TWITCH_IRC_URL};
pub use irc::{parse_line, IrcMessage};

use crate::error::Result;
use async_trait::async_trait;

/// Outbound side of a chat connection
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post a message to a channel
    async fn say(&self, channel: &str, text: &str) -> Result<()>;
}

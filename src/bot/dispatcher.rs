//! Chat command dispatch
//!
//! [`Dispatcher`] turns one chat message into at most one reply. [`ChatBot`]
//! feeds it messages from the chat client one at a time and posts replies.

use super::commands::Command;
use super::handlers::{self, ReplySettings};
use super::store::BroadcasterStore;
use crate::error::{BotError, Result};
use crate::lexer::{tokenize, KeywordTable};
use crate::metrics::MetricsCollector;
use crate::races::SnapshotSource;
use crate::shutdown::Shutdown;
use crate::twitch::ChatClient;
use crate::types::ChatMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Resolves commands against broadcaster records and the current race state
pub struct Dispatcher {
    table: KeywordTable<Command>,
    settings: ReplySettings,
    store: Arc<dyn BroadcasterStore>,
    races: Arc<dyn SnapshotSource>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Dispatcher {
    pub fn new(
        settings: ReplySettings,
        store: Arc<dyn BroadcasterStore>,
        races: Arc<dyn SnapshotSource>,
    ) -> Result<Self> {
        let table = Command::keyword_table(&settings.prefix).map_err(|e| {
            BotError::ConfigurationError {
                message: format!("Invalid command prefix {:?}: {}", settings.prefix, e),
            }
        })?;

        Ok(Self {
            table,
            settings,
            store,
            races,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &ReplySettings {
        &self.settings
    }

    /// Produce the reply for a message, if it is a command the bot answers.
    ///
    /// Messages not addressed to the bot yield `Ok(None)`. An error means the
    /// message was addressed to the bot but its channel could not be resolved.
    pub fn dispatch(&self, message: &ChatMessage) -> Result<Option<String>> {
        let tokens = match tokenize(&message.text, &self.table) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(channel = %message.channel, "Failed to tokenize chat message: {}", e);
                return Ok(None);
            }
        };

        let Some(first) = tokens.first() else {
            return Ok(None);
        };

        let command = match first.keyword() {
            Some(Command::Prefix) => match tokens.get(1) {
                Some(token) => token.keyword(),
                None => {
                    self.record_command(Command::Help);
                    return Ok(Some(handlers::help()));
                }
            },
            Some(command) if command.is_privileged() => Some(command),
            _ => return Ok(None),
        };

        let broadcaster = self
            .store
            .find_by_twitch_id(&message.room_id)?
            .ok_or_else(|| BotError::BroadcasterNotFound {
                room_id: message.room_id.clone(),
                channel: message.channel.clone(),
            })?;

        let Some(command) = command else {
            return Ok(None);
        };
        self.record_command(command);

        if command.is_privileged() {
            if message.author_id != broadcaster.twitch_id {
                debug!(
                    channel = %message.channel,
                    author = %message.author_name,
                    "Ignoring privileged command from non-broadcaster"
                );
                return Ok(None);
            }
            return Ok(Some(command.literal().to_string()));
        }

        match command {
            Command::Help => return Ok(Some(handlers::help())),
            Command::Restream | Command::Leaderboard => {
                debug!(command = %command, "Command has no reply yet");
                return Ok(None);
            }
            _ => {}
        }

        if !command.is_race_scoped() {
            return Ok(None);
        }

        let snapshot = self.races.current();
        let race = if broadcaster.racetime_id.is_empty() {
            None
        } else {
            snapshot.race_with_entrant(&broadcaster.racetime_id)
        };
        let Some(race) = race else {
            return Ok(Some(handlers::not_in_race(&broadcaster)));
        };

        let reply = match command {
            Command::Settings => handlers::settings(&broadcaster, race),
            Command::Race => handlers::race(&broadcaster, race, &self.settings.prefix),
            Command::ExamplePerma => handlers::example_perma(&broadcaster, race),
            Command::Vs => handlers::vs(&broadcaster, race),
            Command::Multi => handlers::multi(&broadcaster, race, &self.settings.multi_stream_url),
            Command::Perma => handlers::perma(&broadcaster, race, &self.settings),
            Command::Link => handlers::link(race, &self.settings.racetime_url),
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }

    fn record_command(&self, command: Command) {
        if let Some(metrics) = &self.metrics {
            metrics.record_command(&command.to_string());
        }
    }
}

/// Sequential command loop over a chat client
pub struct ChatBot {
    dispatcher: Dispatcher,
    client: Arc<dyn ChatClient>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ChatBot {
    pub fn new(dispatcher: Dispatcher, client: Arc<dyn ChatClient>) -> Self {
        Self {
            dispatcher,
            client,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics.clone());
        self.dispatcher = self.dispatcher.with_metrics(metrics);
        self
    }

    /// Dispatch one message and post the reply. Returns the reply that was sent.
    pub async fn handle(&self, message: &ChatMessage) -> Option<String> {
        let reply = match self.dispatcher.dispatch(message) {
            Ok(Some(reply)) => reply,
            Ok(None) => return None,
            Err(e) => {
                error!(channel = %message.channel, "Failed to handle chat command: {:#}", e);
                return None;
            }
        };

        if let Err(e) = self.client.say(&message.channel, &reply).await {
            error!(channel = %message.channel, "Failed to send reply: {:#}", e);
            return None;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_reply();
        }
        Some(reply)
    }

    /// Handle messages in arrival order until shutdown or until the inbound
    /// channel closes
    pub async fn run(&self, mut inbound: mpsc::Receiver<ChatMessage>, mut shutdown: Shutdown) {
        info!(prefix = %self.dispatcher.settings().prefix, "Chat bot started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = inbound.recv() => match next {
                    Some(message) => {
                        self.handle(&message).await;
                    }
                    None => {
                        warn!("Chat client stopped delivering messages");
                        break;
                    }
                },
            }
        }

        info!("Chat bot stopped");
    }
}

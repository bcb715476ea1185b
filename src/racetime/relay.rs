//! Duplex chat connection to a single race room
//!
//! The relay authenticates with a bot access token, reads the room's chat
//! frames, applies a [`RelayPolicy`] to every message posted by a person and
//! writes queued outgoing messages back into the room. Lost connections are
//! re-established with exponential backoff.
//!
//! Reading and writing share one `select!` loop per connection, so a slow
//! write holds back the next read until it completes.

use super::frames::{decode_frame, InboundFrame, OutboundFrame, RoomChatMessage};
use crate::bot::commands::{Command, DEFAULT_PREFIX};
use crate::error::{BotError, Result};
use crate::lexer::{tokenize, KeywordTable, TokenKind};
use crate::metrics::MetricsCollector;
use crate::shutdown::Shutdown;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Upper bound for the reconnect delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type RoomSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What to do with chat lines posted by people in the room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayPolicy {
    /// Log and discard
    #[default]
    Drop,
    /// Hand to the caller's channel
    Forward,
    /// Post prefixed commands back into the room
    Echo,
}

impl FromStr for RelayPolicy {
    type Err = BotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(RelayPolicy::Drop),
            "forward" => Ok(RelayPolicy::Forward),
            "echo" => Ok(RelayPolicy::Echo),
            other => Err(BotError::ConfigurationError {
                message: format!("Unknown relay policy: {}", other),
            }),
        }
    }
}

impl fmt::Display for RelayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayPolicy::Drop => "drop",
            RelayPolicy::Forward => "forward",
            RelayPolicy::Echo => "echo",
        };
        write!(f, "{}", name)
    }
}

/// Connection settings for one race room
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `ws://` or `wss://` origin of the race service
    pub ws_base_url: String,
    /// Race room slug
    pub room: String,
    pub policy: RelayPolicy,
    /// Command prefix a line must start with to be echoed
    pub prefix: String,
    /// How long to wait for the close handshake on shutdown
    pub close_grace: Duration,
    /// Consecutive failed connects tolerated before giving up
    pub max_retries: u32,
    /// Initial reconnect delay, doubled after each failure
    pub retry_delay: Duration,
    /// Capacity of the outgoing and forwarded message queues
    pub outgoing_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "wss://racetime.gg".to_string(),
            room: String::new(),
            policy: RelayPolicy::Drop,
            prefix: DEFAULT_PREFIX.to_string(),
            close_grace: Duration::from_secs(1),
            max_retries: 5,
            retry_delay: Duration::from_millis(1000),
            outgoing_capacity: 64,
        }
    }
}

/// Build the bot endpoint for a room
pub fn room_url(ws_base_url: &str, room: &str, token: &str) -> String {
    format!(
        "{}/ws/o/bot/{}?token={}",
        ws_base_url.trim_end_matches('/'),
        room.trim_matches('/'),
        urlencoding::encode(token)
    )
}

/// Cloneable sender for messages to post into the room
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<String>,
}

impl RelayHandle {
    /// Queue a message. Messages queued while disconnected are sent once the
    /// relay reconnects, unless it gives up first.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(text.into())
            .await
            .map_err(|_| BotError::WebSocket {
                message: "relay has stopped".to_string(),
            })?;
        Ok(())
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Chat relay for one race room
pub struct ChatRelay {
    config: RelayConfig,
    access_token: String,
    keywords: KeywordTable<Command>,
    outgoing_tx: mpsc::Sender<String>,
    outgoing_rx: mpsc::Receiver<String>,
    forward_tx: mpsc::Sender<RoomChatMessage>,
    forward_rx: Option<mpsc::Receiver<RoomChatMessage>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ChatRelay {
    pub fn new(config: RelayConfig, access_token: impl Into<String>) -> Result<Self> {
        let keywords =
            Command::keyword_table(&config.prefix).map_err(|e| BotError::ConfigurationError {
                message: format!("Invalid relay prefix {:?}: {}", config.prefix, e),
            })?;
        let capacity = config.outgoing_capacity.max(1);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(capacity);
        let (forward_tx, forward_rx) = mpsc::channel(capacity);

        Ok(Self {
            config,
            access_token: access_token.into(),
            keywords,
            outgoing_tx,
            outgoing_rx,
            forward_tx,
            forward_rx: Some(forward_rx),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            tx: self.outgoing_tx.clone(),
        }
    }

    /// Receiver for messages kept under [`RelayPolicy::Forward`]. Only the
    /// first call returns it.
    pub fn take_forwarded(&mut self) -> Option<mpsc::Receiver<RoomChatMessage>> {
        self.forward_rx.take()
    }

    /// Run until shutdown or until reconnecting fails `max_retries` times in a row
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<()> {
        let url = room_url(&self.config.ws_base_url, &self.config.room, &self.access_token);
        let mut failures = 0u32;
        let mut delay = self.config.retry_delay;

        info!(room = %self.config.room, policy = %self.config.policy, "Starting race room relay");

        loop {
            let connected = tokio::select! {
                biased;
                _ = shutdown.wait() => return Ok(()),
                result = connect_async(url.as_str()) => result,
            };

            match connected {
                Ok((socket, _response)) => {
                    info!(room = %self.config.room, "Connected to race room");
                    failures = 0;
                    delay = self.config.retry_delay;

                    match self.session(socket, &mut shutdown).await {
                        SessionEnd::Shutdown => {
                            info!(room = %self.config.room, "Race room relay stopped");
                            return Ok(());
                        }
                        SessionEnd::Disconnected => {
                            warn!(room = %self.config.room, "Race room connection lost");
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.config.max_retries {
                        error!(
                            "Failed to connect to race room {} after {} retries",
                            self.config.room, self.config.max_retries
                        );
                        return Err(BotError::WebSocket {
                            message: format!("Max retries exceeded: {}", e),
                        }
                        .into());
                    }

                    warn!(
                        "Race room connection attempt {} failed: {}. Retrying in {:?}",
                        failures, e, delay
                    );
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.wait() => return Ok(()),
                _ = sleep(delay) => {}
            }
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }

    async fn session(&mut self, socket: RoomSocket, shutdown: &mut Shutdown) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    self.close(&mut sink, &mut stream).await;
                    return SessionEnd::Shutdown;
                }
                Some(text) = self.outgoing_rx.recv() => {
                    if let Err(e) = send_message(&mut sink, text).await {
                        warn!(room = %self.config.room, "Failed to send chat message: {}", e);
                        return SessionEnd::Disconnected;
                    }
                }
                next = stream.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(echo) = self.process_frame(&text) {
                            if let Err(e) = send_message(&mut sink, echo).await {
                                warn!(room = %self.config.room, "Failed to echo chat message: {}", e);
                                return SessionEnd::Disconnected;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(room = %self.config.room, ?frame, "Race room closed the connection");
                        return SessionEnd::Disconnected;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(room = %self.config.room, "Race room read error: {}", e);
                        return SessionEnd::Disconnected;
                    }
                    None => return SessionEnd::Disconnected,
                },
            }
        }
    }

    /// Decode one text frame and apply the policy. Returns text to post back
    /// into the room, if any.
    fn process_frame(&self, text: &str) -> Option<String> {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(room = %self.config.room, "Undecodable race room frame: {}", e);
                return None;
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_relay_frame(frame.kind().as_str());
        }

        let message = match frame {
            InboundFrame::ChatMessage(message) => message,
            InboundFrame::Error(errors) => {
                warn!(room = %self.config.room, ?errors, "Race room reported errors");
                return None;
            }
            InboundFrame::RaceData(race) => {
                debug!(room = %self.config.room, status = %race.status.value, "Race data updated");
                return None;
            }
            InboundFrame::Other(kind) => {
                debug!(room = %self.config.room, kind = kind.as_str(), "Ignoring frame");
                return None;
            }
        };

        if !message.is_from_user() {
            return None;
        }

        match self.config.policy {
            RelayPolicy::Drop => {
                info!(room = %self.config.room, id = %message.id, "chat: {}", message.message_plain);
                None
            }
            RelayPolicy::Forward => {
                match self.forward_tx.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(dropped)) => {
                        warn!(room = %self.config.room, id = %dropped.id, "Forward queue full, message dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(room = %self.config.room, "Nobody is receiving forwarded messages");
                    }
                }
                None
            }
            RelayPolicy::Echo => {
                let text = message.message_plain.trim();
                self.is_room_command(text).then(|| text.to_string())
            }
        }
    }

    /// A line that opens with the prefix keyword and has more after it
    fn is_room_command(&self, text: &str) -> bool {
        match tokenize(text, &self.keywords) {
            Ok(tokens) => {
                tokens.len() > 1 && tokens[0].kind == TokenKind::Keyword(Command::Prefix)
            }
            Err(e) => {
                debug!(room = %self.config.room, "Unscannable chat line: {}", e);
                false
            }
        }
    }

    /// Send a close frame and wait briefly for the server to acknowledge it
    async fn close(
        &self,
        sink: &mut SplitSink<RoomSocket, Message>,
        stream: &mut SplitStream<RoomSocket>,
    ) {
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(room = %self.config.room, "Close frame not sent: {}", e);
            return;
        }

        let acknowledged = async {
            while let Some(Ok(message)) = stream.next().await {
                if message.is_close() {
                    break;
                }
            }
        };
        if timeout(self.config.close_grace, acknowledged).await.is_err() {
            debug!(room = %self.config.room, "Close handshake timed out");
        }
    }
}

async fn send_message(sink: &mut SplitSink<RoomSocket, Message>, text: String) -> Result<()> {
    let payload = OutboundFrame::message(text).to_json()?;
    sink.send(Message::Text(payload))
        .await
        .map_err(|e| BotError::WebSocket {
            message: e.to_string(),
        })?;
    Ok(())
}

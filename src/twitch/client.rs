//! Twitch chat over IRC-on-WebSocket

use super::irc::{parse_line, sanitize};
use super::ChatClient;
use crate::error::{BotError, Result};
use crate::shutdown::Shutdown;
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

pub const TWITCH_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type IrcSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the chat server
#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub url: String,
    pub username: String,
    /// Chat OAuth token, with or without the `oauth:` prefix
    pub oauth_token: String,
    /// Channel logins to join, without `#`
    pub channels: Vec<String>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Capacity of the inbound and outgoing queues
    pub queue_capacity: usize,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            url: TWITCH_IRC_URL.to_string(),
            username: String::new(),
            oauth_token: String::new(),
            channels: Vec::new(),
            max_retries: 5,
            retry_delay: Duration::from_millis(1000),
            queue_capacity: 256,
        }
    }
}

/// Sending half, shared with the chat bot
#[derive(Debug, Clone)]
pub struct TwitchIrcClient {
    outgoing: mpsc::Sender<String>,
}

#[async_trait]
impl ChatClient for TwitchIrcClient {
    async fn say(&self, channel: &str, text: &str) -> Result<()> {
        let line = format!(
            "PRIVMSG #{} :{}",
            channel.trim_start_matches('#').to_lowercase(),
            sanitize(text)
        );
        self.outgoing
            .send(line)
            .await
            .map_err(|_| BotError::ChatClient {
                message: "chat connection has stopped".to_string(),
            })?;
        Ok(())
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Owns the socket: joins channels, answers keepalives, delivers inbound
/// PRIVMSGs and writes queued lines
pub struct IrcConnection {
    config: IrcConfig,
    outgoing: mpsc::Receiver<String>,
    inbound: mpsc::Sender<ChatMessage>,
}

/// Create the client, its connection driver and the inbound message stream
pub fn connect(config: IrcConfig) -> (TwitchIrcClient, IrcConnection, mpsc::Receiver<ChatMessage>) {
    let capacity = config.queue_capacity.max(1);
    let (outgoing_tx, outgoing_rx) = mpsc::channel(capacity);
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);

    (
        TwitchIrcClient {
            outgoing: outgoing_tx,
        },
        IrcConnection {
            config,
            outgoing: outgoing_rx,
            inbound: inbound_tx,
        },
        inbound_rx,
    )
}

impl IrcConnection {
    /// Lines sent right after connecting
    pub fn login_lines(&self) -> Vec<String> {
        let token = if self.config.oauth_token.starts_with("oauth:") {
            self.config.oauth_token.clone()
        } else {
            format!("oauth:{}", self.config.oauth_token)
        };

        let mut lines = vec![
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
            format!("PASS {}", token),
            format!("NICK {}", self.config.username.to_lowercase()),
        ];
        if !self.config.channels.is_empty() {
            let channels: Vec<String> = self
                .config
                .channels
                .iter()
                .map(|c| format!("#{}", c.trim_start_matches('#').to_lowercase()))
                .collect();
            lines.push(format!("JOIN {}", channels.join(",")));
        }
        lines
    }

    /// Run until shutdown, reconnecting with backoff when the server drops us
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<()> {
        let mut failures = 0u32;
        let mut delay = self.config.retry_delay;

        loop {
            let connected = tokio::select! {
                biased;
                _ = shutdown.wait() => return Ok(()),
                result = connect_async(self.config.url.as_str()) => result,
            };

            match connected {
                Ok((socket, _response)) => {
                    info!(channels = ?self.config.channels, "Connected to chat server");
                    failures = 0;
                    delay = self.config.retry_delay;

                    match self.session(socket, &mut shutdown).await? {
                        SessionEnd::Shutdown => {
                            info!("Chat connection closed");
                            return Ok(());
                        }
                        SessionEnd::Disconnected => warn!("Chat connection lost"),
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.config.max_retries {
                        error!(
                            "Failed to connect to chat server after {} retries",
                            self.config.max_retries
                        );
                        return Err(BotError::ChatClient {
                            message: format!("Max retries exceeded: {}", e),
                        }
                        .into());
                    }
                    warn!(
                        "Chat connection attempt {} failed: {}. Retrying in {:?}",
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

    async fn session(&mut self, socket: IrcSocket, shutdown: &mut Shutdown) -> Result<SessionEnd> {
        let (mut sink, mut stream) = socket.split();

        for line in self.login_lines() {
            if let Err(e) = send_line(&mut sink, line).await {
                warn!("Chat login failed: {}", e);
                return Ok(SessionEnd::Disconnected);
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!("Close frame not sent: {}", e);
                    }
                    return Ok(SessionEnd::Shutdown);
                }
                Some(line) = self.outgoing.recv() => {
                    if let Err(e) = send_line(&mut sink, line).await {
                        warn!("Failed to send chat line: {}", e);
                        return Ok(SessionEnd::Disconnected);
                    }
                }
                next = stream.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        for line in text.split("\r\n").filter(|l| !l.is_empty()) {
                            if let Some(end) = self.handle_line(line, &mut sink).await? {
                                return Ok(end);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Disconnected),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Chat read error: {}", e);
                        return Ok(SessionEnd::Disconnected);
                    }
                },
            }
        }
    }

    async fn handle_line(
        &self,
        line: &str,
        sink: &mut SplitSink<IrcSocket, Message>,
    ) -> Result<Option<SessionEnd>> {
        let Some(message) = parse_line(line) else {
            return Ok(None);
        };

        match message.command.as_str() {
            "PING" => {
                let server = message.params.first().cloned().unwrap_or_default();
                if send_line(sink, format!("PONG :{}", server)).await.is_err() {
                    return Ok(Some(SessionEnd::Disconnected));
                }
            }
            "RECONNECT" => {
                info!("Chat server requested a reconnect");
                return Ok(Some(SessionEnd::Disconnected));
            }
            "NOTICE" => {
                let text = message.params.last().cloned().unwrap_or_default();
                if text.contains("Login authentication failed") || text.contains("Improperly formatted auth") {
                    return Err(BotError::ChatClient {
                        message: format!("Chat login rejected: {}", text),
                    }
                    .into());
                }
                info!(notice = %text, "Chat server notice");
            }
            "PRIVMSG" => {
                if let Some(chat) = message.into_chat_message() {
                    if self.inbound.send(chat).await.is_err() {
                        debug!("Chat bot is no longer receiving messages");
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }
}

async fn send_line(sink: &mut SplitSink<IrcSocket, Message>, line: String) -> Result<()> {
    sink.send(Message::Text(line))
        .await
        .map_err(|e| BotError::ChatClient {
            message: e.to_string(),
        })?;
    Ok(())
}

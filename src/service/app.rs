//! Main application state and service coordination
//!
//! This module contains the AppState that wires the race monitor, the chat
//! bot, the optional race room relay and the health server together, and
//! owns their background tasks.

use crate::bot::{BroadcasterStore, ChatBot, Dispatcher, InMemoryBroadcasterStore, RaceCache};
use crate::config::AppConfig;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::races::{Monitor, SnapshotSource};
use crate::racetime::{ChatRelay, RaceSource, RacetimeClient};
use crate::service::health::ServiceStatus;
use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::twitch::{self as chat, ChatClient};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Race room relay error: {message}")]
    Relay { message: String },
}

/// A spawned background loop, named for shutdown logging
struct BackgroundTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    client: RacetimeClient,
    monitor: Arc<Monitor>,
    cache: Arc<RaceCache>,
    store: Arc<dyn BroadcasterStore>,
    metrics: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
    status: ServiceStatus,
    shutdown: ShutdownTrigger,
    background_tasks: Vec<BackgroundTask>,
}

impl AppState {
    /// Build every component from configuration. Nothing is started yet.
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing racetime-bot service");
        info!(
            "Configuration: service={}, racetime_url={}, category={}",
            config.service.name, config.racetime.url, config.racetime.category
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let client =
            RacetimeClient::new(config.racetime.url.clone()).map_err(|e| {
                ServiceError::Initialization {
                    message: format!("Failed to create race service client: {}", e),
                }
            })?;

        let source: Arc<dyn RaceSource> = Arc::new(client.clone());
        let monitor = Arc::new(Monitor::with_metrics(
            source,
            config.racetime.category.clone(),
            config.monitor_config(),
            metrics.clone(),
        ));

        let store = Self::load_broadcasters(&config)?;
        let cache = Arc::new(RaceCache::new());

        let status = ServiceStatus::new(
            config.service.name.clone(),
            cache.clone(),
            store.clone(),
            config.refresh_interval(),
        );
        let health_server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: config.service.health_port,
                    host: "0.0.0.0".to_string(),
                },
                metrics.clone(),
            )
            .with_status(status.clone()),
        );

        let (shutdown, _) = shutdown::channel();

        Ok(Self {
            config,
            client,
            monitor,
            cache,
            store,
            metrics,
            health_server,
            status,
            shutdown,
            background_tasks: Vec::new(),
        })
    }

    fn load_broadcasters(config: &AppConfig) -> Result<Arc<dyn BroadcasterStore>, ServiceError> {
        let store = match &config.bot.broadcasters_file {
            Some(path) => {
                let store = InMemoryBroadcasterStore::from_file(path).map_err(|e| {
                    ServiceError::Configuration {
                        message: format!("Failed to load broadcasters from {}: {:#}", path, e),
                    }
                })?;
                info!("Loaded {} broadcasters from {}", store.len(), path);
                store
            }
            None => {
                warn!("No broadcasters file configured, every command will go unanswered");
                InMemoryBroadcasterStore::new()
            }
        };
        Ok(Arc::new(store))
    }

    /// Start all background services
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting racetime-bot service");
        self.status.set_running(true);

        if self.config.service.enable_health_server {
            self.start_health_server();
        }

        self.start_race_monitor();
        self.start_chat_bot()?;
        self.start_relay().await?;
        self.start_uptime_task();

        info!(
            "✅ racetime-bot started with {} background tasks",
            self.background_tasks.len()
        );
        Ok(())
    }

    /// Signal every loop, then wait for them up to the shutdown timeout
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of racetime-bot");

        self.status.set_running(false);
        self.shutdown.trigger();
        self.health_server.stop();

        let deadline = self.config.shutdown_timeout();
        let task_count = self.background_tasks.len();

        for task in self.background_tasks.drain(..) {
            let abort = task.handle.abort_handle();
            match timeout(deadline, task.handle).await {
                Ok(Ok(())) => debug!("Background task '{}' stopped", task.name),
                Ok(Err(e)) if e.is_cancelled() => debug!("Background task '{}' cancelled", task.name),
                Ok(Err(e)) => warn!("Background task '{}' panicked: {}", task.name, e),
                Err(_) => {
                    warn!(
                        "Background task '{}' did not stop within {:?}, aborting",
                        task.name, deadline
                    );
                    abort.abort();
                }
            }
        }

        let snapshot = self.cache.current();
        info!(
            "Final state: {} races tracked, {} listeners",
            snapshot.len(),
            self.monitor.listener_count()
        );
        info!("✅ racetime-bot shutdown completed ({} tasks)", task_count);
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        self.monitor.clone()
    }

    /// Latest races as seen by the chat bot
    pub fn races(&self) -> Arc<RaceCache> {
        self.cache.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// A shutdown listener tied to this service
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.subscribe()
    }

    fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Spawning background task '{}'", name);
        self.background_tasks.push(BackgroundTask {
            name,
            handle: tokio::spawn(task),
        });
    }

    fn start_health_server(&mut self) {
        let server = self.health_server.clone();
        self.spawn("health_server", async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {:#}", e);
            }
        });
        info!(
            "✅ Health endpoints enabled on port {}",
            self.config.service.health_port
        );
    }

    fn start_race_monitor(&mut self) {
        let listener = self.monitor.add_listener();
        let cache = self.cache.clone();
        let shutdown = self.shutdown.subscribe();
        self.spawn("race_cache", async move {
            cache.follow(listener, shutdown).await;
        });

        let monitor = self.monitor.clone();
        let shutdown = self.shutdown.subscribe();
        self.spawn("race_monitor", async move {
            monitor.run(shutdown).await;
        });

        info!(
            "✅ Monitoring category '{}' every {}s",
            self.config.racetime.category, self.config.racetime.refresh_interval_seconds
        );
    }

    fn start_chat_bot(&mut self) -> Result<(), ServiceError> {
        if !self.config.has_chat_credentials() {
            warn!("Chat credentials missing, chat bot disabled");
            return Ok(());
        }

        let channels: Vec<String> = self
            .store
            .find_active()
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to list active broadcasters: {:#}", e),
            })?
            .into_iter()
            .map(|record| record.twitch_name)
            .collect();

        if channels.is_empty() {
            warn!("No active broadcasters, chat bot will not join any channel");
        }

        let dispatcher = Dispatcher::new(
            self.config.reply_settings(),
            self.store.clone(),
            self.cache.clone(),
        )
        .map_err(|e| ServiceError::Configuration {
            message: format!("{:#}", e),
        })?;

        let (client, connection, inbound) = chat::connect(self.config.irc_config(channels));
        let client: Arc<dyn ChatClient> = Arc::new(client);
        let bot = ChatBot::new(dispatcher, client).with_metrics(self.metrics.clone());

        let shutdown = self.shutdown.subscribe();
        self.spawn("chat_connection", async move {
            if let Err(e) = connection.run(shutdown).await {
                error!("Chat connection stopped: {:#}", e);
            }
        });

        let shutdown = self.shutdown.subscribe();
        self.spawn("chat_bot", async move {
            bot.run(inbound, shutdown).await;
        });

        info!("✅ Chat bot started as {}", self.config.twitch.username);
        Ok(())
    }

    async fn start_relay(&mut self) -> Result<(), ServiceError> {
        let Some(relay_config) = self.config.relay_config() else {
            debug!("No relay room configured");
            return Ok(());
        };

        let token = self
            .client
            .authorize(&self.config.credentials())
            .await
            .map_err(|e| ServiceError::Relay {
                message: format!("Failed to authorize bot application: {:#}", e),
            })?;
        debug!(scope = %token.scope(), expires_in = token.expires_in(), "Bot token issued");

        let room = relay_config.room.clone();
        let policy = relay_config.policy;
        let mut relay = ChatRelay::new(relay_config, token.as_str())
            .map_err(|e| ServiceError::Relay {
                message: format!("Failed to create race room relay: {:#}", e),
            })?
            .with_metrics(self.metrics.clone());

        if let Some(mut forwarded) = relay.take_forwarded() {
            let mut shutdown = self.shutdown.subscribe();
            self.spawn("relay_forward", async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        next = forwarded.recv() => match next {
                            Some(message) => {
                                let author = message
                                    .user
                                    .as_ref()
                                    .map(|user| user.name.as_str())
                                    .unwrap_or_default();
                                info!(author = %author, "Race room: {}", message.message_plain);
                            }
                            None => break,
                        },
                    }
                }
            });
        }

        let shutdown = self.shutdown.subscribe();
        self.spawn("race_room_relay", async move {
            if let Err(e) = relay.run(shutdown).await {
                error!("Race room relay stopped: {:#}", e);
            }
        });

        info!("✅ Relaying race room '{}' with policy {}", room, policy);
        Ok(())
    }

    fn start_uptime_task(&mut self) {
        let metrics = self.metrics.clone();
        let mut shutdown = self.shutdown.subscribe();
        self.spawn("uptime", async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => {
                        let uptime = metrics.update_uptime();
                        debug!("Updated service uptime: {}s", uptime);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.enable_health_server = false;
        // unroutable, so the monitor only logs fetch failures
        config.racetime.url = "http://127.0.0.1:9".to_string();
        config.racetime.fetch_on_start = false;
        config.service.shutdown_timeout_seconds = 5;
        config
    }

    #[tokio::test]
    async fn test_new_without_broadcasters_file() {
        let state = AppState::new(offline_config()).unwrap();
        assert!(!state.is_running());
        assert_eq!(state.monitor().category(), state.config().racetime.category);
        assert!(state.races().current().is_empty());
    }

    #[tokio::test]
    async fn test_missing_broadcasters_file_is_a_configuration_error() {
        let mut config = offline_config();
        config.bot.broadcasters_file = Some("/nonexistent/broadcasters.toml".to_string());

        match AppState::new(config) {
            Err(ServiceError::Configuration { message }) => {
                assert!(message.contains("/nonexistent/broadcasters.toml"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[tokio::test]
    async fn test_start_and_shutdown_without_chat() {
        let mut file = temp_file_with(
            r#"
            [[broadcasters]]
            twitch_id = "1001"
            racetime_id = "abc"
            twitch_name = "streamer"
            twitch_display_name = "Streamer"
            active = true
            "#,
        );
        file.flush().unwrap();

        let mut config = offline_config();
        config.bot.broadcasters_file = Some(file.path.clone());

        let mut state = AppState::new(config).unwrap();
        state.start().await.unwrap();
        assert!(state.is_running());
        // race cache follower, monitor and uptime
        assert_eq!(state.background_tasks.len(), 3);
        assert_eq!(state.monitor().listener_count(), 1);

        let mut signal = state.shutdown_signal();
        state.shutdown().await.unwrap();
        assert!(!state.is_running());
        assert!(state.background_tasks.is_empty());
        signal.wait().await;
    }

    struct TempFile {
        path: String,
        file: std::fs::File,
    }

    impl Write for TempFile {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.file.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.file.flush()
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn temp_file_with(content: &str) -> TempFile {
        let path = std::env::temp_dir()
            .join(format!("broadcasters-{}.toml", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        TempFile { path, file }
    }
}

//! Main entry point for the racetime-bot service
//!
//! Loads configuration, initializes logging, starts the race monitor, chat
//! bot and optional race room relay, and shuts everything down on SIGINT or
//! SIGTERM.

use anyhow::Result;
use clap::Parser;
use racetime_bot::config::{validate_config, AppConfig};
use racetime_bot::racetime::RelayPolicy;
use racetime_bot::service::AppState;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

/// racetime-bot - answers chat commands about live races
#[derive(Parser)]
#[command(
    name = "racetime-bot",
    version,
    about = "A chat bot that answers race commands from live racetime.gg category state",
    long_about = "racetime-bot polls a racetime.gg category for open races, joins the chat \
                 channels of configured broadcasters and answers commands about the race each \
                 broadcaster is in. It can also connect to a single race room as a bot."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Category override
    #[arg(long, value_name = "SLUG", help = "Override the race category to monitor")]
    category: Option<String>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Race room to relay
    #[arg(long, value_name = "ROOM", help = "Connect to a race room as a bot (category/slug)")]
    relay_room: Option<String>,

    /// Relay policy override
    #[arg(long, value_name = "POLICY", help = "What to do with room chat: drop, forward or echo")]
    relay_policy: Option<RelayPolicy>,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🏁 racetime-bot {}", racetime_bot::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Racetime: {}", config.racetime.url);
    info!("   Category: {}", config.racetime.category);
    info!(
        "   Refresh interval: {}s",
        config.racetime.refresh_interval_seconds
    );
    info!("   Command prefix: {}", config.bot.prefix);
    if config.service.enable_health_server {
        info!("   Health port: {}", config.service.health_port);
    }
    match &config.relay.room {
        Some(room) if !room.is_empty() => {
            info!("   Relay: {} ({})", room, config.relay.policy)
        }
        _ => info!("   Relay: disabled"),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment, file and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(category) = &args.category {
        config.racetime.category = category.clone();
    }

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(room) = &args.relay_room {
        config.relay.room = Some(room.clone());
    }

    if let Some(policy) = args.relay_policy {
        config.relay.policy = policy;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        let _ = app_state.shutdown().await;
        std::process::exit(1);
    }

    info!("✅ racetime-bot is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    if let Err(e) = app_state.shutdown().await {
        error!("Shutdown failed: {}", e);
    }

    info!("🛑 racetime-bot stopped");
    Ok(())
}

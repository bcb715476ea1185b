//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the race bot: race polling,
//! snapshot fan-out, command handling and relay traffic.

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

/// Main metrics collector for the race bot
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Race polling and fan-out metrics
    race_metrics: RaceMetrics,

    /// Chat command metrics
    command_metrics: CommandMetrics,

    /// Race room relay metrics
    relay_metrics: RelayMetrics,

    started_at: Instant,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,
}

/// Race polling and fan-out metrics
#[derive(Clone)]
pub struct RaceMetrics {
    /// Race list fetches by result
    pub polls_total: IntCounterVec,

    /// Races in the current snapshot
    pub snapshot_races: IntGauge,

    /// Registered snapshot listeners
    pub listeners: IntGauge,

    /// Snapshots a slow listener missed
    pub snapshots_dropped_total: IntCounter,
}

/// Chat command metrics
#[derive(Clone)]
pub struct CommandMetrics {
    /// Recognized commands by name
    pub commands_total: IntCounterVec,

    /// Replies posted to chat
    pub replies_total: IntCounter,
}

/// Race room relay metrics
#[derive(Clone)]
pub struct RelayMetrics {
    /// Inbound frames by kind
    pub frames_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let race_metrics = RaceMetrics::new(&registry)?;
        let command_metrics = CommandMetrics::new(&registry)?;
        let relay_metrics = RelayMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            race_metrics,
            command_metrics,
            relay_metrics,
            started_at: Instant::now(),
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn races(&self) -> &RaceMetrics {
        &self.race_metrics
    }

    pub fn commands(&self) -> &CommandMetrics {
        &self.command_metrics
    }

    pub fn relay(&self) -> &RelayMetrics {
        &self.relay_metrics
    }

    /// Record a race list fetch
    pub fn record_poll(&self, success: bool) {
        let result = if success { "success" } else { "failed" };
        self.race_metrics
            .polls_total
            .with_label_values(&[result])
            .inc();
    }

    pub fn set_snapshot_races(&self, count: usize) {
        self.race_metrics.snapshot_races.set(count as i64);
    }

    pub fn set_listener_count(&self, count: usize) {
        self.race_metrics.listeners.set(count as i64);
    }

    pub fn record_snapshots_dropped(&self, count: usize) {
        if count > 0 {
            self.race_metrics
                .snapshots_dropped_total
                .inc_by(count as u64);
        }
    }

    /// Record a recognized chat command
    pub fn record_command(&self, command: &str) {
        self.command_metrics
            .commands_total
            .with_label_values(&[command])
            .inc();
    }

    pub fn record_reply(&self) {
        self.command_metrics.replies_total.inc();
    }

    /// Record an inbound relay frame
    pub fn record_relay_frame(&self, kind: &str) {
        self.relay_metrics
            .frames_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Refresh the uptime gauge and return the uptime in seconds
    pub fn update_uptime(&self) -> u64 {
        let uptime = self.started_at.elapsed().as_secs();
        self.service_metrics.uptime_seconds.set(uptime as i64);
        uptime
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("racetime_bot_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self { uptime_seconds })
    }
}

impl RaceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let polls_total = IntCounterVec::new(
            Opts::new("racetime_bot_polls_total", "Race list fetches"),
            &["result"],
        )?;
        registry.register(Box::new(polls_total.clone()))?;

        let snapshot_races = IntGauge::new(
            "racetime_bot_snapshot_races",
            "Races in the current snapshot",
        )?;
        registry.register(Box::new(snapshot_races.clone()))?;

        let listeners = IntGauge::new("racetime_bot_listeners", "Registered snapshot listeners")?;
        registry.register(Box::new(listeners.clone()))?;

        let snapshots_dropped_total = IntCounter::new(
            "racetime_bot_snapshots_dropped_total",
            "Snapshots missed by listeners with full buffers",
        )?;
        registry.register(Box::new(snapshots_dropped_total.clone()))?;

        Ok(Self {
            polls_total,
            snapshot_races,
            listeners,
            snapshots_dropped_total,
        })
    }
}

impl CommandMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new("racetime_bot_commands_total", "Recognized chat commands"),
            &["command"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let replies_total = IntCounter::new("racetime_bot_replies_total", "Replies posted to chat")?;
        registry.register(Box::new(replies_total.clone()))?;

        Ok(Self {
            commands_total,
            replies_total,
        })
    }
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let frames_total = IntCounterVec::new(
            Opts::new("racetime_bot_relay_frames_total", "Inbound race room frames"),
            &["kind"],
        )?;
        registry.register(Box::new(frames_total.clone()))?;

        Ok(Self { frames_total })
    }
}

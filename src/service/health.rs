//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the race bot,
//! including readiness and liveness checks.

use crate::bot::BroadcasterStore;
use crate::races::SnapshotSource;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Shared view of the running service used by health checks
#[derive(Clone)]
pub struct ServiceStatus {
    name: String,
    running: Arc<AtomicBool>,
    races: Arc<dyn SnapshotSource>,
    store: Arc<dyn BroadcasterStore>,
    refresh_interval: Duration,
}

impl ServiceStatus {
    pub fn new(
        name: impl Into<String>,
        races: Arc<dyn SnapshotSource>,
        store: Arc<dyn BroadcasterStore>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            running: Arc::new(AtomicBool::new(false)),
            races,
            store,
            refresh_interval,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Races in the latest snapshot
    pub races_tracked: usize,
    /// When the latest snapshot was fetched
    pub last_fetch: Option<DateTime<Utc>>,
    /// Broadcasters whose channels are joined
    pub active_broadcasters: usize,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub fn check(status: &ServiceStatus) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(status),
            Self::check_race_monitor(status, Utc::now()),
            Self::check_broadcasters(status),
        ];

        let overall = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| match (&acc, &check.status) {
                (_, HealthStatus::Unhealthy) | (HealthStatus::Unhealthy, _) => {
                    HealthStatus::Unhealthy
                }
                (_, HealthStatus::Degraded) => HealthStatus::Degraded,
                _ => acc,
            });

        Ok(HealthCheck {
            status: overall,
            service: status.name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            checks,
            stats: Self::gather_service_stats(status),
        })
    }

    /// Simple liveness check - just verify service is running
    pub fn liveness_check(status: &ServiceStatus) -> HealthStatus {
        if status.is_running() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Readiness check - the service is running and has race data to answer from
    pub fn readiness_check(status: &ServiceStatus) -> HealthStatus {
        if !status.is_running() {
            return HealthStatus::Unhealthy;
        }
        Self::check_race_monitor(status, Utc::now()).status
    }

    fn check_service_running(status: &ServiceStatus) -> ComponentCheck {
        let (health, message) = if status.is_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status: health,
            message,
        }
    }

    /// A snapshot older than three refresh intervals means fetches are failing
    fn check_race_monitor(status: &ServiceStatus, now: DateTime<Utc>) -> ComponentCheck {
        let snapshot = status.races.current();
        let stale_after = chrono::Duration::from_std(status.refresh_interval * 3)
            .unwrap_or_else(|_| chrono::Duration::weeks(52));

        let (health, message) = match snapshot.fetched_at() {
            None => (
                HealthStatus::Degraded,
                Some("No race list fetched yet".to_string()),
            ),
            Some(fetched_at) if now - fetched_at > stale_after => (
                HealthStatus::Degraded,
                Some(format!("Race list last fetched at {}", fetched_at)),
            ),
            Some(_) => (HealthStatus::Healthy, None),
        };

        ComponentCheck {
            name: "race_monitor".to_string(),
            status: health,
            message,
        }
    }

    fn check_broadcasters(status: &ServiceStatus) -> ComponentCheck {
        let (health, message) = match status.store.find_active() {
            Ok(active) if active.is_empty() => (
                HealthStatus::Degraded,
                Some("No active broadcasters configured".to_string()),
            ),
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };

        ComponentCheck {
            name: "broadcaster_store".to_string(),
            status: health,
            message,
        }
    }

    fn gather_service_stats(status: &ServiceStatus) -> ServiceStats {
        let snapshot = status.races.current();
        let active_broadcasters = match status.store.find_active() {
            Ok(active) => active.len(),
            Err(e) => {
                debug!("Failed to count broadcasters for health check: {}", e);
                0
            }
        };

        ServiceStats {
            races_tracked: snapshot.len(),
            last_fetch: snapshot.fetched_at(),
            active_broadcasters,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

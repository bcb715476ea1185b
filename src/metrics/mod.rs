//! Metrics and monitoring for the race bot
//!
//! This module provides Prometheus metrics collection and the HTTP
//! endpoints that expose them alongside health checks.

pub mod collector;
pub mod health;

pub use collector::{CommandMetrics, MetricsCollector, RaceMetrics, RelayMetrics, ServiceMetrics};
pub use health::{encode_metrics, HealthServer, HealthServerConfig};

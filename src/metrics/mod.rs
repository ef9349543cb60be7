//! Metrics and monitoring for the game server
//!
//! Prometheus metric groups for players, sessions and the worker pool, plus
//! the HTTP server exposing them alongside the health probes.

pub mod collector;
pub mod health;

pub use collector::{
    MetricsCollector, MetricsTimer, PlayerMetrics, PoolMetrics, ServiceMetrics, SessionMetrics,
};
pub use health::{HealthEndpoints, HealthServer, HealthServerConfig};

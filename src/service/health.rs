//! Health checks and monitoring
//!
//! This module provides health check functionality for the game server,
//! including readiness and liveness probes.

use crate::matchmaking::Matchmaker;
use crate::player::PlayerRegistry;
use crate::worker::WorkerPool;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Pool queue utilization above which the service reports degraded
pub const POOL_DEGRADED_UTILIZATION: f64 = 0.8;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form used by the health gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Combine two statuses, keeping the worse one
    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
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

/// Cheap handle on the components a health check inspects
#[derive(Clone)]
pub struct ServiceMonitor {
    service_name: String,
    registry: Arc<PlayerRegistry>,
    matchmaker: Matchmaker,
    pool: WorkerPool,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ServiceMonitor {
    pub fn new(
        service_name: impl Into<String>,
        registry: Arc<PlayerRegistry>,
        matchmaker: Matchmaker,
        pool: WorkerPool,
        is_running: Arc<RwLock<bool>>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            registry,
            matchmaker,
            pool,
            is_running,
            started_at: Instant::now(),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
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
    /// Optional explanation if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players logged in
    pub players_connected: usize,
    /// Players waiting for an opponent
    pub players_waiting: usize,
    /// Players bound to a running session
    pub players_in_session: usize,
    /// Pairs formed since start
    pub matches_made: u64,
    pub pool_running: usize,
    pub pool_queued: usize,
    pub pool_rejected: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(monitor: &ServiceMonitor) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(monitor).await,
            Self::check_worker_pool(monitor),
            Self::check_matchmaker(monitor),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |overall, check| {
                overall.worst(check.status.clone())
            });

        Ok(HealthCheck {
            status,
            service: monitor.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(monitor),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(monitor: &ServiceMonitor) -> Result<HealthStatus> {
        if monitor.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify the service can take new players
    pub async fn readiness_check(monitor: &ServiceMonitor) -> Result<HealthStatus> {
        if !monitor.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_worker_pool(monitor).status)
    }

    async fn check_service_running(monitor: &ServiceMonitor) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if monitor.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Closed pool is unhealthy; a nearly full wait queue is degraded
    fn check_worker_pool(monitor: &ServiceMonitor) -> ComponentCheck {
        let start = std::time::Instant::now();
        let stats = monitor.pool.stats();

        let (status, message) = if monitor.pool.is_closed() {
            (
                HealthStatus::Unhealthy,
                Some("Worker pool is closed".to_string()),
            )
        } else if stats.queue_utilization() > POOL_DEGRADED_UTILIZATION {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "Worker pool queue at {:.0}% ({} of {})",
                    stats.queue_utilization() * 100.0,
                    stats.queued,
                    stats.max_queued
                )),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "worker_pool".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_matchmaker(monitor: &ServiceMonitor) -> ComponentCheck {
        let start = std::time::Instant::now();
        let stats = monitor.matchmaker.stats();

        ComponentCheck {
            name: "matchmaker".to_string(),
            status: HealthStatus::Healthy,
            message: Some(format!(
                "{} waiting, {} in session",
                stats.players_waiting, stats.players_active
            )),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    fn gather_service_stats(monitor: &ServiceMonitor) -> ServiceStats {
        let matchmaker = monitor.matchmaker.stats();
        let pool = monitor.pool.stats();

        ServiceStats {
            players_connected: monitor.registry.len(),
            players_waiting: matchmaker.players_waiting,
            players_in_session: matchmaker.players_active,
            matches_made: matchmaker.pairs_made,
            pool_running: pool.running,
            pool_queued: pool.queued,
            pool_rejected: pool.rejected,
            uptime_seconds: monitor.uptime_seconds(),
        }
    }

    /// Convert health check to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

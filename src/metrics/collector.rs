//! Metrics collection using Prometheus
//!
//! Counters and gauges for connected players, the matchmaking queue, game
//! sessions and the worker pool.

use crate::matchmaking::MatchmakerStats;
use crate::types::{Decision, Role};
use crate::worker::PoolStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the game server
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Player and queue metrics
    player_metrics: PlayerMetrics,

    /// Session and round metrics
    session_metrics: SessionMetrics,

    /// Worker pool metrics
    pool_metrics: PoolMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Player-related metrics
#[derive(Clone)]
pub struct PlayerMetrics {
    /// Players with a live connection that completed login
    pub players_connected: IntGauge,

    /// Total logins
    pub players_registered_total: IntCounter,

    /// Total enqueues into matchmaking
    pub players_queued_total: IntCounter,

    /// Players currently waiting for an opponent
    pub players_waiting: IntGauge,

    /// Total pairs formed by the matchmaker
    pub matches_made_total: IntCounter,
}

/// Session-related metrics
#[derive(Clone)]
pub struct SessionMetrics {
    pub sessions_started_total: IntCounter,

    /// Sessions currently running
    pub active_sessions: IntGauge,

    /// Finished sessions by end reason
    pub sessions_ended_total: IntCounterVec,

    pub session_duration_seconds: Histogram,

    /// Finished rounds by winning role
    pub rounds_played_total: IntCounterVec,

    /// Questions asked per round
    pub questions_per_round: Histogram,

    /// Resolved votes by decision
    pub votes_total: IntCounterVec,
}

/// Worker pool metrics
#[derive(Clone)]
pub struct PoolMetrics {
    pub tasks_running: IntGauge,
    pub tasks_queued: IntGauge,

    /// Rejected submissions by submitter
    pub rejections_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let player_metrics = PlayerMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let pool_metrics = PoolMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            player_metrics,
            session_metrics,
            pool_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn player(&self) -> &PlayerMetrics {
        &self.player_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn pool(&self) -> &PoolMetrics {
        &self.pool_metrics
    }

    /// Record a completed login
    pub fn record_player_connected(&self) {
        self.player_metrics.players_registered_total.inc();
        self.player_metrics.players_connected.inc();
    }

    /// Record a player leaving the registry
    pub fn record_player_disconnected(&self) {
        self.player_metrics.players_connected.dec();
    }

    pub fn record_player_queued(&self) {
        self.player_metrics.players_queued_total.inc();
    }

    pub fn set_players_waiting(&self, waiting: usize) {
        self.player_metrics.players_waiting.set(waiting as i64);
    }

    pub fn record_match_made(&self) {
        self.player_metrics.matches_made_total.inc();
    }

    pub fn record_session_started(&self) {
        self.session_metrics.sessions_started_total.inc();
        self.session_metrics.active_sessions.inc();
    }

    /// Record a finished session and how long it ran
    pub fn record_session_ended(&self, reason: &str, duration_seconds: f64) {
        self.session_metrics
            .sessions_ended_total
            .with_label_values(&[reason])
            .inc();
        self.session_metrics.active_sessions.dec();
        self.session_metrics
            .session_duration_seconds
            .observe(duration_seconds);
    }

    pub fn record_round_finished(&self, winner: Role, questions_asked: u32) {
        let winner = match winner {
            Role::GameMaster => "game_master",
            Role::Guesser => "guesser",
        };

        self.session_metrics
            .rounds_played_total
            .with_label_values(&[winner])
            .inc();
        self.session_metrics
            .questions_per_round
            .observe(questions_asked as f64);
    }

    pub fn record_vote(&self, decision: Decision) {
        self.session_metrics
            .votes_total
            .with_label_values(&[decision.as_str()])
            .inc();
    }

    /// Record a submission the worker pool turned away
    pub fn record_pool_rejection(&self, source: &str) {
        self.pool_metrics
            .rejections_total
            .with_label_values(&[source])
            .inc();
    }

    /// Update gauges from a pool snapshot
    pub fn update_pool_stats(&self, stats: &PoolStats) {
        self.pool_metrics.tasks_running.set(stats.running as i64);
        self.pool_metrics.tasks_queued.set(stats.queued as i64);
    }

    /// Update gauges from matchmaker stats
    pub fn update_from_matchmaker_stats(&self, stats: &MatchmakerStats) {
        self.player_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new(
            "twenty_questions_uptime_seconds",
            "Service uptime in seconds",
        )?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "twenty_questions_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new(
                "twenty_questions_component_health",
                "Component health status",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl PlayerMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_connected = IntGauge::new(
            "twenty_questions_players_connected",
            "Players logged in with a live connection",
        )?;
        registry.register(Box::new(players_connected.clone()))?;

        let players_registered_total = IntCounter::new(
            "twenty_questions_players_registered_total",
            "Total completed logins",
        )?;
        registry.register(Box::new(players_registered_total.clone()))?;

        let players_queued_total = IntCounter::new(
            "twenty_questions_players_queued_total",
            "Total players queued for a match",
        )?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let players_waiting = IntGauge::new(
            "twenty_questions_players_waiting",
            "Players currently waiting for an opponent",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let matches_made_total = IntCounter::new(
            "twenty_questions_matches_made_total",
            "Total pairs formed",
        )?;
        registry.register(Box::new(matches_made_total.clone()))?;

        Ok(Self {
            players_connected,
            players_registered_total,
            players_queued_total,
            players_waiting,
            matches_made_total,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_started_total = IntCounter::new(
            "twenty_questions_sessions_started_total",
            "Total sessions started",
        )?;
        registry.register(Box::new(sessions_started_total.clone()))?;

        let active_sessions = IntGauge::new(
            "twenty_questions_active_sessions",
            "Sessions currently running",
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_ended_total = IntCounterVec::new(
            Opts::new(
                "twenty_questions_sessions_ended_total",
                "Total sessions ended",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(sessions_ended_total.clone()))?;

        let session_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "twenty_questions_session_duration_seconds",
                "Session duration in seconds",
            )
            .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        )?;
        registry.register(Box::new(session_duration_seconds.clone()))?;

        let rounds_played_total = IntCounterVec::new(
            Opts::new(
                "twenty_questions_rounds_played_total",
                "Total rounds played",
            ),
            &["winner"],
        )?;
        registry.register(Box::new(rounds_played_total.clone()))?;

        let questions_per_round = Histogram::with_opts(
            HistogramOpts::new(
                "twenty_questions_questions_per_round",
                "Questions asked per round",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 15.0, 20.0]),
        )?;
        registry.register(Box::new(questions_per_round.clone()))?;

        let votes_total = IntCounterVec::new(
            Opts::new("twenty_questions_votes_total", "Play-again votes"),
            &["decision"],
        )?;
        registry.register(Box::new(votes_total.clone()))?;

        Ok(Self {
            sessions_started_total,
            active_sessions,
            sessions_ended_total,
            session_duration_seconds,
            rounds_played_total,
            questions_per_round,
            votes_total,
        })
    }
}

impl PoolMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tasks_running = IntGauge::new(
            "twenty_questions_pool_tasks_running",
            "Worker pool tasks holding a worker",
        )?;
        registry.register(Box::new(tasks_running.clone()))?;

        let tasks_queued = IntGauge::new(
            "twenty_questions_pool_tasks_queued",
            "Worker pool tasks waiting for a worker",
        )?;
        registry.register(Box::new(tasks_queued.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "twenty_questions_pool_rejections_total",
                "Submissions rejected by the worker pool",
            ),
            &["source"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        Ok(Self {
            tasks_running,
            tasks_queued,
            rejections_total,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

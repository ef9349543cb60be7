//! Main application state and service coordination
//!
//! `AppState` owns every long-lived component of the game server. It wires
//! the lobby into the matchmaker and starts the game listener, the health
//! server and the metrics refresh task.

use crate::config::{validate_config, AppConfig};
use crate::lobby::Lobby;
use crate::matchmaking::{MatchHandler, Matchmaker};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::player::PlayerRegistry;
use crate::server::GameListener;
use crate::service::health::{HealthCheck, HealthStatus, ServiceMonitor};
use crate::worker::WorkerPool;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often gauges are refreshed from component stats
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    registry: Arc<PlayerRegistry>,
    pool: WorkerPool,
    matchmaker: Matchmaker,
    lobby: Lobby,

    metrics_collector: Arc<MetricsCollector>,
    health_server: Option<Arc<HealthServer>>,

    /// Cancelled once on shutdown; every loop owned by the service watches it
    shutdown: CancellationToken,
    background_tasks: Vec<JoinHandle<()>>,

    /// Address the game listener actually bound
    listen_addr: Option<SocketAddr>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Build every component from configuration. Nothing is bound yet.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        info!("Initializing {} game server", config.service.name);
        info!(
            "Configuration: listen={}, health_port={}, max_questions={}, vote_timeout={}s, workers={}, queue={}",
            config.listen_addr(),
            config.service.health_port,
            config.game.max_questions,
            config.game.vote_timeout_seconds,
            config.pool.max_workers,
            config.pool.max_queued
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let registry = Arc::new(PlayerRegistry::new());
        let pool = WorkerPool::new(config.pool_config());
        let matchmaker =
            Matchmaker::with_metrics(config.pair_retry_delay(), metrics_collector.clone());
        let lobby = Lobby::new(
            &config.game,
            registry.clone(),
            matchmaker.clone(),
            pool.clone(),
            metrics_collector.clone(),
        );

        Ok(Self {
            config,
            registry,
            pool,
            matchmaker,
            lobby,
            metrics_collector,
            health_server: None,
            shutdown: CancellationToken::new(),
            background_tasks: Vec::new(),
            listen_addr: None,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Bind the listener and start every background loop
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} game server", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_health_server().await?;
        self.start_matchmaker();
        self.start_listener().await?;
        self.start_background_tasks();

        info!("✅ Game server started successfully");
        Ok(())
    }

    /// Stop accepting players and wind down background tasks
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of the game server");

        *self.is_running.write().await = false;

        self.shutdown.cancel();
        self.pool.close();
        info!("✅ Listener, matchmaker and worker pool stopped");

        if let Some(health_server) = &self.health_server {
            if let Err(e) = health_server.stop().await {
                warn!("Failed to stop health server: {}", e);
            } else {
                info!("✅ Health server stopped");
            }
        }

        self.stop_background_tasks().await;

        info!(
            "Final statistics: players={:?}, matchmaker={:?}, pool={:?}",
            self.registry.stats(),
            self.matchmaker.stats(),
            self.pool.stats()
        );
        info!("✅ Game server shutdown completed");

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Game listener address, once started
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    /// Handle for health checks that does not borrow the service
    pub fn monitor(&self) -> ServiceMonitor {
        ServiceMonitor::new(
            self.config.service.name.clone(),
            self.registry.clone(),
            self.matchmaker.clone(),
            self.pool.clone(),
            self.is_running.clone(),
        )
    }

    async fn start_health_server(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_monitor(self.monitor()),
        );
        self.health_server = Some(health_server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            } else {
                debug!("Health server task completed");
            }
        });
        self.background_tasks.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!(
            "✅ Health endpoints started on port {}",
            self.config.service.health_port
        );
        Ok(())
    }

    fn start_matchmaker(&mut self) {
        let matchmaker = self.matchmaker.clone();
        let handler: Arc<dyn MatchHandler> = Arc::new(self.lobby.clone());
        let shutdown = self.shutdown.clone();

        self.background_tasks.push(tokio::spawn(async move {
            matchmaker.run(handler, shutdown).await;
        }));

        info!("✅ Matchmaker started");
    }

    async fn start_listener(&mut self) -> Result<(), ServiceError> {
        let listener = GameListener::bind(
            &self.config.listen_addr(),
            self.lobby.clone(),
            self.pool.clone(),
            self.metrics_collector.clone(),
        )
        .await
        .map_err(|e| ServiceError::Initialization {
            message: format!("{:#}", e),
        })?;

        self.listen_addr = listener.local_addr().ok();

        let shutdown = self.shutdown.clone();
        self.background_tasks.push(tokio::spawn(async move {
            listener.run(shutdown).await;
        }));

        info!("✅ Game listener started on {}", self.config.listen_addr());
        Ok(())
    }

    fn start_background_tasks(&mut self) {
        let monitor = self.monitor();
        let metrics_collector = self.metrics_collector.clone();
        let pool = self.pool.clone();
        let matchmaker = self.matchmaker.clone();
        let shutdown = self.shutdown.clone();

        let metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_REFRESH_INTERVAL);
            let started_at = Instant::now();
            debug!("Metrics refresh task started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.cancelled() => break,
                }

                metrics_collector.update_uptime(started_at.elapsed());
                metrics_collector.update_pool_stats(&pool.stats());
                metrics_collector.update_from_matchmaker_stats(&matchmaker.stats());

                match HealthCheck::check(&monitor).await {
                    Ok(health) => {
                        metrics_collector.update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            metrics_collector.update_component_health(
                                &check.name,
                                check.status != HealthStatus::Unhealthy,
                            );
                        }
                    }
                    Err(e) => warn!("Health check failed during metrics refresh: {}", e),
                }
            }

            debug!("Metrics refresh task stopped");
        });

        self.background_tasks.push(metrics_task);
        info!(
            "Metrics refresh task started ({}s interval)",
            METRICS_REFRESH_INTERVAL.as_secs()
        );
    }

    /// Let background tasks observe the cancellation, aborting stragglers
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        let deadline = Instant::now() + Duration::from_secs(1);

        for (i, mut task) in self.background_tasks.drain(..).enumerate() {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                debug!("Aborting background task {}/{}", i + 1, task_count);
                task.abort();
            }
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

//! Main application configuration
//!
//! Settings come from environment variables or a TOML file, then from CLI
//! overrides in `main`. Every loader ends with `validate_config`.

use crate::worker::PoolConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub matchmaking: MatchmakingSettings,
    pub game: GameSettings,
    pub pool: PoolSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Game listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind the game listener to
    pub host: String,
    /// Game listener port
    pub port: u16,
}

/// Matchmaking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Delay before retrying a pair whose session could not be scheduled
    pub pair_retry_delay_ms: u64,
}

/// Game rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Questions the Guesser may ask per round
    pub max_questions: u32,
    /// Time both players have to vote on another round
    pub vote_timeout_seconds: u64,
}

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Tasks that may execute at once
    pub max_workers: usize,
    /// Tasks that may wait for a worker before submissions are rejected
    pub max_queued: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "twenty-questions".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            pair_retry_delay_ms: 250,
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_questions: 20,
            vote_timeout_seconds: 15,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        Self {
            max_workers: defaults.max_workers,
            max_queued: defaults.max_queued,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Listener settings
        if let Ok(host) = env::var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid SERVER_PORT value: {}", port))?;
        }

        // Matchmaking settings
        if let Ok(delay) = env::var("PAIR_RETRY_DELAY_MS") {
            config.matchmaking.pair_retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid PAIR_RETRY_DELAY_MS value: {}", delay))?;
        }

        // Game settings
        if let Ok(max_questions) = env::var("MAX_QUESTIONS") {
            config.game.max_questions = max_questions
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_QUESTIONS value: {}", max_questions))?;
        }
        if let Ok(timeout) = env::var("VOTE_TIMEOUT_SECONDS") {
            config.game.vote_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid VOTE_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Worker pool settings
        if let Ok(workers) = env::var("MAX_WORKERS") {
            config.pool.max_workers = workers
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_WORKERS value: {}", workers))?;
        }
        if let Ok(queued) = env::var("MAX_QUEUED_TASKS") {
            config.pool.max_queued = queued
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_QUEUED_TASKS value: {}", queued))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Address the game listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn pair_retry_delay(&self) -> Duration {
        Duration::from_millis(self.matchmaking.pair_retry_delay_ms)
    }

    /// Deadline for the between-round vote
    pub fn vote_timeout(&self) -> Duration {
        Duration::from_secs(self.game.vote_timeout_seconds)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_workers: self.pool.max_workers,
            max_queued: self.pool.max_queued,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.server.host.trim().is_empty() {
        return Err(anyhow!("Server host cannot be empty"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.game.vote_timeout_seconds == 0 {
        return Err(anyhow!("Vote timeout must be greater than 0"));
    }
    if config.matchmaking.pair_retry_delay_ms == 0 {
        return Err(anyhow!("Pair retry delay must be greater than 0"));
    }

    // Validate game and pool settings
    if config.game.max_questions == 0 {
        return Err(anyhow!("Question limit must be greater than 0"));
    }
    if config.pool.max_workers == 0 {
        return Err(anyhow!("Worker pool needs at least one worker"));
    }

    Ok(())
}

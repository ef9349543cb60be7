//! Main entry point for the Twenty Questions game server
//!
//! Loads configuration, initializes logging and runs the server until a
//! shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};
use twenty_questions::config::{validate_config, AppConfig};
use twenty_questions::service::{AppState, HealthCheck, HealthStatus, ServiceMonitor};

/// Twenty Questions - multiplayer guessing game server
#[derive(Parser)]
#[command(
    name = "twenty-questions",
    version,
    about = "A TCP server for two-player games of Twenty Questions",
    long_about = "Players connect over TCP, pick a username and join a matchmaking queue. \
                 Matched pairs play rounds of Twenty Questions, swapping roles at random, \
                 until one of them declines or lets the between-round vote time out."
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

    /// Perform health check and exit
    #[arg(long, help = "Build the service, run a health check and exit")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "HOST", help = "Override game listener host")]
    host: Option<String>,

    #[arg(short, long, value_name = "PORT", help = "Override game listener port")]
    port: Option<u16>,

    #[arg(long, value_name = "PORT", help = "Override health and metrics port")]
    health_port: Option<u16>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Override the between-round vote deadline"
    )]
    vote_timeout: Option<u64>,

    #[arg(long, value_name = "COUNT", help = "Override worker pool size")]
    max_workers: Option<usize>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

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

/// Build the service without binding anything and report its health
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config).await?;

    match HealthCheck::check(&app_state.monitor()).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            for check in &health.checks {
                println!(
                    "  {}: {} {}",
                    check.name,
                    check.status,
                    check.message.as_deref().unwrap_or("")
                );
            }
            println!("  Players connected: {}", health.stats.players_connected);
            println!("  Pool capacity in use: {}", health.stats.pool_running);

            // Not started, so only configuration and wiring are verified here
            let wired = health
                .checks
                .iter()
                .filter(|check| check.name != "service_running")
                .all(|check| check.status != HealthStatus::Unhealthy);
            std::process::exit(if wired { 0 } else { 1 });
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
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

/// Log a health summary every 30 seconds
async fn health_check_task(monitor: ServiceMonitor) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while monitor.is_running().await {
        interval.tick().await;

        match HealthCheck::check(&monitor).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} players connected, {} waiting, {} in session",
                    health.status,
                    health.stats.players_connected,
                    health.stats.players_waiting,
                    health.stats.players_in_session
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Twenty Questions Game Server");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Listening on: {}", config.listen_addr());
    info!("   Health port: {}", config.service.health_port);
    info!("   Questions per round: {}", config.game.max_questions);
    info!("   Vote timeout: {}s", config.game.vote_timeout_seconds);
    info!(
        "   Worker pool: {} workers, {} queued",
        config.pool.max_workers, config.pool.max_queued
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load configuration from a file or the environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(vote_timeout) = args.vote_timeout {
        config.game.vote_timeout_seconds = vote_timeout;
    }

    if let Some(max_workers) = args.max_workers {
        config.pool.max_workers = max_workers;
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

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(app_state.monitor()));

    info!("✅ Twenty Questions server is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    info!("🛑 Twenty Questions server stopped");
    Ok(())
}

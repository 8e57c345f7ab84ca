//! Main entry point for the Ladder Room coordinator
//!
//! Loads configuration, initialises logging, runs the coordinator and shuts
//! it down gracefully on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use ladder_room::config::{validate_config, AppConfig};
use ladder_room::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Ladder Room - chat-driven matchmaking ladder
#[derive(Parser)]
#[command(
    name = "ladder-room",
    version,
    about = "A chat-driven matchmaking coordinator for a skill-ranked player ladder",
    long_about = "Ladder Room queues players from chat commands, forms matches when the queue \
                 fills, applies match results to TrueSkill (or Elo) ratings and serves a cached, \
                 sorted ladder."
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
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

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

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,

    #[arg(long, value_name = "DIR", help = "Directory to watch for match result files")]
    watch_dir: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "SQLite URL of the player database")]
    database_url: Option<String>,

    #[arg(long, value_name = "N", help = "Override the number of players per match")]
    max_queue_size: Option<usize>,

    #[arg(long, value_name = "PORT", help = "Override health and metrics port")]
    health_port: Option<u16>,
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
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(mut config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    config.service.console = false;
    let app_state = AppState::new(config).await?;
    let context = app_state.context();
    context.set_running(true).await;

    match HealthCheck::check(&context).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            for check in &health.checks {
                println!(
                    "  {}: {}{}",
                    check.name,
                    check.status,
                    check
                        .message
                        .as_ref()
                        .map(|m| format!(" ({})", m))
                        .unwrap_or_default()
                );
            }
            if let Some(players) = health.stats.registered_players {
                println!("  Registered players: {}", players);
            }

            if health.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
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

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Ladder Room coordinator");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   Players per match: {}, concurrent matches: {}",
        config.queue.max_queue_size, config.queue.max_concurrent_matches
    );
    info!("   Rating algorithm: {:?}", config.rating.algorithm);
    info!(
        "   Player store: {}",
        if config.store.database_url.is_some() {
            "sqlite"
        } else {
            "in-memory"
        }
    );
    match &config.results.watch_dir {
        Some(dir) => info!("   Results directory: {}", dir.display()),
        None => info!("   Results directory: none"),
    }
}

/// Load and merge configuration from file/environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(dir) = &args.watch_dir {
        config.results.watch_dir = Some(dir.clone());
    }

    if let Some(url) = &args.database_url {
        config.store.database_url = Some(url.clone());
    }

    if let Some(size) = args.max_queue_size {
        config.queue.max_queue_size = size;
    }

    if let Some(port) = args.health_port {
        config.service.health_port = port;
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

    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Ladder Room is running; press Ctrl+C to shut down");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    // A blocked stdin read would otherwise keep the runtime alive
    if config.service.console {
        std::process::exit(0);
    }

    info!("Ladder Room stopped");
    Ok(())
}

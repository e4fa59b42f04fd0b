//! Main entry point for the Waiting Room service
//!
//! This is the production entry point that initializes and runs the
//! admission-control service with proper error handling, logging, and
//! graceful shutdown.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};
use waiting_room::config::{validate_config, AppConfig};
use waiting_room::service::{AppState, HealthCheck, HealthStatus, ServiceProbe};

/// Waiting Room Service - admission control for ticket booking
#[derive(Parser)]
#[command(
    name = "waiting-room",
    version,
    about = "An admission-control waiting room for high-contention ticket booking",
    long_about = "Waiting Room puts subjects in per-performance queues, admits a bounded number \
                 of them at a time in join order, and reclaims admission slots that are not \
                 used within their time window. Clients poll their position over HTTP."
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

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Sweep interval override
    #[arg(long, value_name = "SECONDS", help = "Override TTL sweep interval")]
    sweep_interval: Option<u64>,

    /// Disable implicit queue creation
    #[arg(
        long,
        help = "Do not create booking queues on the first start-booking call"
    )]
    no_auto_create: bool,

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

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config)?;
    // Components are checked as they would be once serving
    *app_state.probe().is_running.write().await = true;

    match HealthCheck::check(app_state.probe()).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            println!("  Queues: {}", health.stats.queues);
            println!("  Entries Waiting: {}", health.stats.entries_waiting);
            println!("  Entries Enterable: {}", health.stats.entries_enterable);
            for check in &health.checks {
                println!("  {}: {}", check.name, check.status);
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

/// Log a health summary periodically
async fn health_check_task(probe: ServiceProbe) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while probe.is_running().await {
        interval.tick().await;

        match HealthCheck::check(&probe).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} queues, {} waiting, {} enterable",
                    health.status,
                    health.stats.queues,
                    health.stats.entries_waiting,
                    health.stats.entries_enterable
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
    info!("🚀 Waiting Room Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   HTTP: {}:{}", config.http.host, config.http.port);
    info!(
        "   Admin auth: {}",
        if config.http.admin_token.is_some() {
            "bearer token"
        } else {
            "open"
        }
    );
    info!(
        "   Sweep interval: {}s",
        config.admission.sweep_interval_seconds
    );
    info!(
        "   Default limits: {} active, {} min TTL",
        config.queue_defaults.max_active_users, config.queue_defaults.entry_ttl_minutes
    );
    info!("   Known schedules: {}", config.schedules.len());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
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

    if let Some(http_port) = args.http_port {
        config.http.port = http_port;
    }

    if let Some(interval) = args.sweep_interval {
        config.admission.sweep_interval_seconds = interval;
    }

    if args.no_auto_create {
        config.admission.auto_create_on_start_booking = false;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Some(config_path) = &args.config {
        info!("Loaded configuration from: {}", config_path.display());
    }

    // Handle special modes
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
    let mut app_state = match AppState::new(config.clone()) {
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

    let health_task = tokio::spawn(health_check_task(app_state.probe().clone()));

    info!("✅ Waiting Room Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    // Background tasks get the shutdown timeout; allow a little extra for the final report
    let shutdown_timeout = config.shutdown_timeout() + Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    info!("🛑 Waiting Room Service stopped");
    Ok(())
}

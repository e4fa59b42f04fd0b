//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the queue
//! registry, the HTTP server and the background tasks together.

use crate::config::AppConfig;
use crate::gateway::{app_router, GatewayState, HttpServer, HttpServerConfig};
use crate::metrics::{HealthServerState, MetricsCollector};
use crate::queue::{QueueRegistry, StaticQueueProvider, SweepPolicy, TtlSweeper};
use crate::service::health::{HealthCheck, HealthStatus, ServiceProbe};
use crate::statistics::StatisticsAccumulator;
use crate::types::QueueFilter;
use crate::utils::SystemClock;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// How often uptime and health gauges are refreshed
const HEALTH_METRICS_INTERVAL: Duration = Duration::from_secs(15);

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
    /// Application configuration
    config: AppConfig,

    /// Every queue and its ledger
    registry: Arc<QueueRegistry>,

    /// Prometheus metrics shared by all components
    metrics: Arc<MetricsCollector>,

    /// Queue API plus health and metrics routes
    router: Router,

    /// HTTP server; started by `start`
    server: Arc<HttpServer>,

    /// Sweeper waiting to be spawned
    sweeper: Option<TtlSweeper>,

    /// What health checks look at
    probe: ServiceProbe,

    /// Stops the sweeper and the health metrics task
    shutdown_tx: broadcast::Sender<()>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing waiting-room service");
        info!(
            "Configuration: service={}, http={}:{}, sweep_interval={}s, known_schedules={}",
            config.service.name,
            config.http.host,
            config.http.port,
            config.admission.sweep_interval_seconds,
            config.schedules.len()
        );

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        let registry = Arc::new(Self::initialize_registry(&config, metrics.clone()));

        let sweeper = TtlSweeper::new(registry.clone(), config.sweep_interval());
        let is_running = Arc::new(RwLock::new(false));
        let probe = ServiceProbe {
            service_name: config.service.name.clone(),
            registry: registry.clone(),
            sweeper: sweeper.status(),
            sweep_interval: sweeper.interval(),
            is_running: is_running.clone(),
            started_at: Instant::now(),
        };

        let gateway = GatewayState::new(registry.clone())
            .with_admin_token(config.http.admin_token.clone())
            .with_poll_interval(config.admission.poll_interval_seconds);
        if gateway.admin_token.is_none() {
            warn!("No admin token configured - admin routes are open");
        }
        let health = HealthServerState::new(metrics.clone()).with_probe(probe.clone());
        let router = app_router(gateway, health);

        let server = Arc::new(HttpServer::new(
            HttpServerConfig {
                port: config.http.port,
                host: config.http.host.clone(),
            },
            router.clone(),
        ));

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            registry,
            metrics,
            router,
            server,
            sweeper: Some(sweeper),
            probe,
            shutdown_tx,
            background_tasks: Vec::new(),
            is_running,
        })
    }

    fn initialize_registry(config: &AppConfig, metrics: Arc<MetricsCollector>) -> QueueRegistry {
        let provider = Arc::new(StaticQueueProvider::from_config(
            &config.queue_defaults,
            &config.schedules,
        ));
        let policy = SweepPolicy {
            abandon_after: config.abandon_after(),
            outcome_retention: config.outcome_retention(),
        };

        match policy.abandon_after {
            Some(idle) => info!(
                "Waiting entries idle for {}s will be reclaimed",
                idle.num_seconds()
            ),
            None => info!("Abandonment reclamation disabled"),
        }

        QueueRegistry::with_components(
            provider,
            Arc::new(StatisticsAccumulator::new()),
            metrics,
            Arc::new(SystemClock),
        )
        .with_sweep_policy(policy)
        .with_auto_create(config.admission.auto_create_on_start_booking)
    }

    /// Start the HTTP server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting waiting-room service");

        *self.is_running.write().await = true;

        self.start_http_server().await?;
        self.start_background_tasks()?;

        info!("✅ Waiting-room service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of waiting-room service");

        *self.is_running.write().await = false;

        if let Err(e) = self.server.stop().await {
            warn!("Failed to stop HTTP server: {}", e);
        }
        // No receivers just means nothing was started
        let _ = self.shutdown_tx.send(());

        self.stop_background_tasks().await;

        let queues = self
            .registry
            .list_queues(&QueueFilter::default())
            .await
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;
        let waiting: u64 = queues.iter().map(|q| q.current_waiting).sum();
        let enterable: u64 = queues.iter().map(|q| q.current_enterable).sum();

        info!(
            "Final service statistics: queues={}, waiting={}, enterable={}",
            queues.len(),
            waiting,
            enterable
        );
        info!("✅ Waiting-room service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn registry(&self) -> Arc<QueueRegistry> {
        self.registry.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Full router, usable without binding a socket
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn probe(&self) -> &ServiceProbe {
        &self.probe
    }

    async fn start_http_server(&mut self) -> Result<(), ServiceError> {
        let addr = self
            .server
            .address()
            .map_err(|e| ServiceError::Configuration {
                message: e.to_string(),
            })?;

        let server = self.server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("HTTP server failed: {}", e);
            } else {
                info!("HTTP server task completed");
            }
        });
        self.background_tasks.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ HTTP server started on {}", addr);
        Ok(())
    }

    fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        let sweeper = self
            .sweeper
            .take()
            .ok_or_else(|| ServiceError::BackgroundTask {
                message: "Sweeper already started".to_string(),
            })?;
        info!(
            "Starting TTL sweeper ({}s interval)...",
            sweeper.interval().as_secs()
        );
        let sweeper_task = sweeper.spawn(self.shutdown_tx.subscribe());

        info!(
            "Starting health metrics task ({}s interval)...",
            HEALTH_METRICS_INTERVAL.as_secs()
        );
        let health_metrics_task = {
            let metrics = self.metrics.clone();
            let probe = self.probe.clone();
            let mut shutdown = self.shutdown_tx.subscribe();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(HEALTH_METRICS_INTERVAL);
                info!("Health metrics task started");

                loop {
                    tokio::select! {
                        _ = interval.tick() => refresh_health_metrics(&metrics, &probe).await,
                        _ = shutdown.recv() => break,
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(sweeper_task);
        self.background_tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    /// Wait for background tasks, aborting whatever outlives the shutdown timeout
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout();

        for (i, mut task) in self.background_tasks.drain(..).enumerate() {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => debug!("Background task {}/{} finished", i + 1, task_count),
                Ok(Err(e)) => warn!("Background task {}/{} failed: {}", i + 1, task_count, e),
                Err(_) => {
                    warn!(
                        "Background task {}/{} did not stop in time - aborting",
                        i + 1,
                        task_count
                    );
                    task.abort();
                }
            }
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

async fn refresh_health_metrics(metrics: &MetricsCollector, probe: &ServiceProbe) {
    metrics
        .service()
        .uptime_seconds
        .set(probe.uptime().as_secs() as i64);

    match HealthCheck::check(probe).await {
        Ok(health) => {
            metrics.update_health_status(health.status.as_gauge());
            for check in &health.checks {
                metrics.update_component_health(&check.name, check.status == HealthStatus::Healthy);
            }
            debug!(
                "Updated service health metrics - status: {}, uptime: {}s",
                health.status, health.stats.uptime_seconds
            );
        }
        Err(e) => warn!("Failed to refresh health metrics: {}", e),
    }
}

//! Health check endpoints and Prometheus metrics routes
//!
//! These routes are merged into the main HTTP server next to the queue API.

use crate::metrics::collector::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus, ServiceProbe};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Shared state for the health routes
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub probe: Option<ServiceProbe>,
}

impl HealthServerState {
    pub fn new(metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            metrics_collector,
            probe: None,
        }
    }

    /// Attach the probe used by health checks
    pub fn with_probe(mut self, probe: ServiceProbe) -> Self {
        self.probe = Some(probe);
        self
    }
}

/// Router with all health and metrics endpoints
pub fn health_router(state: HealthServerState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// Encode every registered metric in the Prometheus text format
pub fn encode_metrics(metrics_collector: &MetricsCollector) -> anyhow::Result<String> {
    let metric_families = metrics_collector.registry().gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    Ok(String::from_utf8(buffer)?)
}

/// Root endpoint handler - shows service information
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "waiting-room",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/queues"
        ]
    }))
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = match &state.probe {
        Some(probe) => HealthCheck::liveness_check(probe)
            .await
            .unwrap_or(HealthStatus::Unhealthy),
        None => HealthStatus::Unhealthy,
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let mut body = json!({
        "status": status,
        "service": "waiting-room",
        "version": env!("CARGO_PKG_VERSION")
    });
    if state.probe.is_none() {
        body["error"] = json!("Service not initialized");
    }

    (code, Json(body))
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.probe {
        Some(probe) => match HealthCheck::readiness_check(probe).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match &state.probe {
        Some(probe) => match HealthCheck::liveness_check(probe).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    match encode_metrics(&state.metrics_collector) {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            output,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(probe) = &state.probe else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "service": {
                    "name": "waiting-room",
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": "error"
                },
                "error": "Service not initialized",
                "timestamp": chrono::Utc::now()
            })),
        );
    };

    match HealthCheck::check(probe).await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime_seconds": health.stats.uptime_seconds
                },
                "queues": {
                    "registered": health.stats.queues,
                    "waiting": health.stats.entries_waiting,
                    "enterable": health.stats.entries_enterable
                },
                "sweeper": {
                    "runs": health.stats.sweeps_run
                },
                "components": health.checks,
                "timestamp": health.timestamp
            })),
        ),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": {
                        "name": probe.service_name,
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": "error"
                    },
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}

//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the waiting-room
//! service, including readiness and liveness probes.

use crate::queue::{QueueRegistry, SweeperStatus};
use crate::types::QueueFilter;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value used by the health metric
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
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

/// Everything a health check needs to look at
#[derive(Clone)]
pub struct ServiceProbe {
    pub service_name: String,
    pub registry: Arc<QueueRegistry>,
    pub sweeper: Arc<SweeperStatus>,
    pub sweep_interval: Duration,
    pub is_running: Arc<RwLock<bool>>,
    pub started_at: Instant,
}

impl ServiceProbe {
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
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
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Number of registered queues
    pub queues: usize,
    /// Entries waiting across all queues
    pub entries_waiting: u64,
    /// Entries admitted across all queues
    pub entries_enterable: u64,
    /// Sweeps run since start
    pub sweeps_run: u64,
    /// Seconds since the service started
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(probe: &ServiceProbe) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(probe).await,
            Self::check_registry(probe),
            Self::check_sweeper(probe),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |overall, check| overall.worst(check.status));
        let stats = Self::gather_service_stats(probe).await;

        Ok(HealthCheck {
            status,
            service: probe.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(probe: &ServiceProbe) -> Result<HealthStatus> {
        if probe.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(probe: &ServiceProbe) -> Result<HealthStatus> {
        if !probe.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_registry(probe).status)
    }

    async fn check_service_running(probe: &ServiceProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if probe.is_running().await {
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

    fn check_registry(probe: &ServiceProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match probe.registry.queue_count() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Unhealthy,
                Some(format!("Cannot access queue registry: {}", e)),
            ),
        };

        ComponentCheck {
            name: "queue_registry".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_sweeper(probe: &ServiceProbe) -> ComponentCheck {
        let start = Instant::now();
        // A sweeper that skipped three ticks is lagging
        let allowed_lag = probe.sweep_interval * 3;

        let (status, message) = if let Some(e) = probe.sweeper.last_error() {
            (
                HealthStatus::Degraded,
                Some(format!("Last sweep failed: {}", e)),
            )
        } else {
            match probe.sweeper.last_run() {
                Some(last_run) => {
                    let since = (probe.registry.now() - last_run)
                        .to_std()
                        .unwrap_or_default();
                    if since > allowed_lag {
                        (
                            HealthStatus::Degraded,
                            Some(format!("No sweep for {}s", since.as_secs())),
                        )
                    } else {
                        (HealthStatus::Healthy, None)
                    }
                }
                None if probe.uptime() > allowed_lag => (
                    HealthStatus::Degraded,
                    Some("Sweeper has not run yet".to_string()),
                ),
                None => (HealthStatus::Healthy, None),
            }
        };

        ComponentCheck {
            name: "ttl_sweeper".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(probe: &ServiceProbe) -> ServiceStats {
        let mut stats = ServiceStats {
            sweeps_run: probe.sweeper.runs(),
            uptime_seconds: probe.uptime().as_secs(),
            ..ServiceStats::default()
        };

        match probe.registry.list_queues(&QueueFilter::default()).await {
            Ok(queues) => {
                stats.queues = queues.len();
                stats.entries_waiting = queues.iter().map(|q| q.current_waiting).sum();
                stats.entries_enterable = queues.iter().map(|q| q.current_enterable).sum();
            }
            Err(e) => debug!("Failed to list queues for health check: {}", e),
        }

        stats
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::StaticQueueProvider;
    use crate::utils::ManualClock;

    fn probe(running: bool) -> ServiceProbe {
        let registry = QueueRegistry::new(
            Arc::new(StaticQueueProvider::new()),
            Arc::new(ManualClock::default()),
        )
        .unwrap();
        ServiceProbe {
            service_name: "waiting-room".to_string(),
            registry: Arc::new(registry),
            sweeper: Arc::new(SweeperStatus::default()),
            sweep_interval: Duration::from_secs(5),
            is_running: Arc::new(RwLock::new(running)),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_healthy_when_running() {
        let probe = probe(true);
        let health = HealthCheck::check(&probe).await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(health.stats.queues, 0);
        assert!(health.to_json().unwrap().contains("queue_registry"));

        assert_eq!(
            HealthCheck::liveness_check(&probe).await.unwrap(),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthCheck::readiness_check(&probe).await.unwrap(),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_unhealthy_when_stopped() {
        let probe = probe(false);
        let health = HealthCheck::check(&probe).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(
            HealthCheck::readiness_check(&probe).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_status_ordering() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(HealthStatus::Healthy.as_gauge(), 2);
    }
}

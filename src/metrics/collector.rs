//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the waiting-room service
//! using Prometheus metrics.

use crate::queue::ledger::{LedgerEvent, SweepReport};
use crate::types::{QueueId, QueueType};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the waiting-room service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue and entry metrics
    queue_metrics: QueueMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// HTTP requests by route and status code
    pub http_requests_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue and entry metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Registered queues by type
    pub active_queues: IntGaugeVec,

    /// Entry transitions by queue type and transition
    pub transitions_total: IntCounterVec,

    /// Entries currently waiting, per queue
    pub entries_waiting: IntGaugeVec,

    /// Entries currently admitted, per queue
    pub entries_enterable: IntGaugeVec,

    /// Time from joining to admission
    pub admission_wait_seconds: HistogramVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Duration of a full sweep over all queues
    pub sweep_duration: Histogram,

    /// Entries handled by sweeps, by outcome
    pub sweep_entries_total: IntCounterVec,

    /// HTTP request handling duration by route
    pub request_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a queue being created
    pub fn record_queue_created(&self, queue_type: QueueType) {
        self.queue_metrics
            .active_queues
            .with_label_values(&[queue_type.label()])
            .inc();
    }

    /// Record a queue being deleted and drop its per-queue series
    pub fn record_queue_deleted(&self, queue_id: QueueId, queue_type: QueueType) {
        self.queue_metrics
            .active_queues
            .with_label_values(&[queue_type.label()])
            .dec();

        let queue_label = queue_id.to_string();
        let _ = self
            .queue_metrics
            .entries_waiting
            .remove_label_values(&[queue_label.as_str()]);
        let _ = self
            .queue_metrics
            .entries_enterable
            .remove_label_values(&[queue_label.as_str()]);
    }

    /// Record the transitions produced by one ledger operation
    pub fn record_events(&self, queue_type: QueueType, events: &[LedgerEvent]) {
        let type_label = queue_type.label();

        for event in events {
            let transition = match event {
                LedgerEvent::Created { .. } => "joined",
                LedgerEvent::Admitted { waited, .. } => {
                    self.queue_metrics
                        .admission_wait_seconds
                        .with_label_values(&[type_label])
                        .observe(waited.num_milliseconds().max(0) as f64 / 1000.0);
                    "admitted"
                }
                LedgerEvent::Expired { .. } => "expired",
                LedgerEvent::Completed { .. } => "completed",
                LedgerEvent::Exited { .. } => "exited",
                LedgerEvent::Abandoned { .. } => "abandoned",
            };

            self.queue_metrics
                .transitions_total
                .with_label_values(&[type_label, transition])
                .inc();
        }
    }

    /// Update live depth gauges for one queue
    pub fn update_queue_depth(&self, queue_id: QueueId, waiting: usize, enterable: usize) {
        let queue_label = queue_id.to_string();

        self.queue_metrics
            .entries_waiting
            .with_label_values(&[queue_label.as_str()])
            .set(waiting as i64);

        self.queue_metrics
            .entries_enterable
            .with_label_values(&[queue_label.as_str()])
            .set(enterable as i64);
    }

    /// Record one sweep over all queues
    pub fn record_sweep(&self, report: &SweepReport, duration: Duration) {
        self.performance_metrics
            .sweep_duration
            .observe(duration.as_secs_f64());

        for (outcome, count) in [
            ("expired", report.expired),
            ("abandoned", report.abandoned),
            ("promoted", report.promoted),
        ] {
            if count > 0 {
                self.performance_metrics
                    .sweep_entries_total
                    .with_label_values(&[outcome])
                    .inc_by(count as u64);
            }
        }
    }

    /// Record an HTTP request
    pub fn record_request(&self, route: &str, status: u16, duration: Duration) {
        let status = status.to_string();

        self.service_metrics
            .http_requests_total
            .with_label_values(&[route, status.as_str()])
            .inc();

        self.performance_metrics
            .request_duration
            .with_label_values(&[route])
            .observe(duration.as_secs_f64());
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

    /// Get the elapsed duration
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
        let uptime_seconds =
            IntGauge::new("waiting_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("waiting_room_http_requests_total", "Total HTTP requests"),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let health_status = IntGauge::new(
            "waiting_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("waiting_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            http_requests_total,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_queues = IntGaugeVec::new(
            Opts::new("waiting_room_active_queues", "Number of registered queues"),
            &["queue_type"],
        )?;
        registry.register(Box::new(active_queues.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "waiting_room_entry_transitions_total",
                "Entry transitions observed",
            ),
            &["queue_type", "transition"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let entries_waiting = IntGaugeVec::new(
            Opts::new("waiting_room_entries_waiting", "Entries currently waiting"),
            &["queue_id"],
        )?;
        registry.register(Box::new(entries_waiting.clone()))?;

        let entries_enterable = IntGaugeVec::new(
            Opts::new(
                "waiting_room_entries_enterable",
                "Entries currently admitted",
            ),
            &["queue_id"],
        )?;
        registry.register(Box::new(entries_enterable.clone()))?;

        let admission_wait_seconds = HistogramVec::new(
            HistogramOpts::new(
                "waiting_room_admission_wait_seconds",
                "Time from joining to admission",
            )
            .buckets(vec![
                0.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
            ]),
            &["queue_type"],
        )?;
        registry.register(Box::new(admission_wait_seconds.clone()))?;

        Ok(Self {
            active_queues,
            transitions_total,
            entries_waiting,
            entries_enterable,
            admission_wait_seconds,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sweep_duration = Histogram::with_opts(
            HistogramOpts::new(
                "waiting_room_sweep_duration_seconds",
                "Duration of a sweep over all queues",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(sweep_duration.clone()))?;

        let sweep_entries_total = IntCounterVec::new(
            Opts::new(
                "waiting_room_sweep_entries_total",
                "Entries handled by sweeps",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(sweep_entries_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "waiting_room_request_duration_seconds",
                "HTTP request duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["route"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            sweep_duration,
            sweep_entries_total,
            request_duration,
        })
    }
}

//! Metrics and monitoring for the waiting-room service
//!
//! This module provides Prometheus metrics collection plus the health and
//! metrics HTTP routes.

pub mod collector;
pub mod health;

pub use collector::{MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics, ServiceMetrics};
pub use health::{encode_metrics, health_router, HealthServerState};

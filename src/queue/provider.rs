//! Queue provider traits and implementations
//!
//! The provider answers two questions the registry cannot answer on its own:
//! which limits a queue gets when it is opened implicitly, and which
//! performance a booking schedule belongs to.

use crate::config::{QueueDefaults, ScheduleBinding};
use crate::error::{AdmissionError, Result};
use crate::types::{PerformanceId, QueueLimits, QueueType};
use std::collections::HashMap;

/// Trait for providing queue defaults and schedule lookups
#[cfg_attr(test, mockall::automock)]
pub trait QueueProvider: Send + Sync {
    /// Limits for a queue of this type opened without explicit configuration
    fn default_limits(&self, queue_type: QueueType) -> QueueLimits;

    /// Performance a schedule belongs to, if known
    fn performance_for_schedule(&self, schedule_id: &str) -> Option<PerformanceId>;

    /// Validate limits before a queue is created or updated
    fn validate_limits(&self, limits: &QueueLimits) -> Result<()> {
        validate_limits(limits)
    }
}

/// Shared validation for queue limits
pub fn validate_limits(limits: &QueueLimits) -> Result<()> {
    if limits.max_active_users < 1 {
        return Err(AdmissionError::InvalidConfiguration {
            reason: "maxActiveUsers must be at least 1".to_string(),
        }
        .into());
    }
    if limits.entry_ttl_minutes < 1 {
        return Err(AdmissionError::InvalidConfiguration {
            reason: "entryTtlMinutes must be at least 1".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Static provider backed by configuration
///
/// Every queue type shares the configured defaults except where an
/// override was registered; schedules come from the `[[schedules]]` table.
#[derive(Debug, Clone)]
pub struct StaticQueueProvider {
    defaults: QueueLimits,
    overrides: HashMap<QueueType, QueueLimits>,
    schedules: HashMap<String, PerformanceId>,
}

impl StaticQueueProvider {
    /// Create a provider with built-in defaults and no known schedules
    pub fn new() -> Self {
        Self::from_config(&QueueDefaults::default(), &[])
    }

    /// Create a provider from configuration
    pub fn from_config(defaults: &QueueDefaults, schedules: &[ScheduleBinding]) -> Self {
        Self {
            defaults: defaults.limits(),
            overrides: HashMap::new(),
            schedules: schedules
                .iter()
                .map(|binding| (binding.schedule_id.clone(), binding.performance_id.clone()))
                .collect(),
        }
    }

    /// Use different limits for one queue type
    pub fn with_override(mut self, queue_type: QueueType, limits: QueueLimits) -> Result<Self> {
        validate_limits(&limits)?;
        self.overrides.insert(queue_type, limits);
        Ok(self)
    }

    /// Register a schedule of a performance
    pub fn with_schedule(mut self, schedule_id: &str, performance_id: &str) -> Self {
        self.schedules
            .insert(schedule_id.to_string(), performance_id.to_string());
        self
    }
}

impl Default for StaticQueueProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueProvider for StaticQueueProvider {
    fn default_limits(&self, queue_type: QueueType) -> QueueLimits {
        self.overrides
            .get(&queue_type)
            .copied()
            .unwrap_or(self.defaults)
    }

    fn performance_for_schedule(&self, schedule_id: &str) -> Option<PerformanceId> {
        self.schedules.get(schedule_id).cloned()
    }
}

//! Queue configuration defaults

use crate::types::{PerformanceId, QueueLimits, ScheduleId};
use serde::{Deserialize, Serialize};

/// Limits applied to queues created implicitly when booking opens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDefaults {
    pub max_active_users: u32,
    pub entry_ttl_minutes: u32,
}

impl Default for QueueDefaults {
    fn default() -> Self {
        Self {
            max_active_users: 100,
            entry_ttl_minutes: 10,
        }
    }
}

impl QueueDefaults {
    pub fn limits(&self) -> QueueLimits {
        QueueLimits::new(self.max_active_users, self.entry_ttl_minutes)
    }
}

/// Known schedule of a performance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBinding {
    pub schedule_id: ScheduleId,
    pub performance_id: PerformanceId,
}

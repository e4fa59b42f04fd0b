//! Utility functions and the time source for the waiting room service

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Generate a new unique queue ID
pub fn generate_queue_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Source of "now" for admission decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        current_timestamp()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut time) = self.time.lock() {
            *time += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut time) = self.time.lock() {
            *time = to;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(current_timestamp())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
            .lock()
            .map(|time| *time)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

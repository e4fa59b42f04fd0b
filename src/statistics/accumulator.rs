//! Append-only status counters per queue
//!
//! Counters are plain atomics, bumped while the owning queue's lock is held.
//! A queue's counters exist from `register` until `remove`; events for any
//! other queue id are dropped. `reset` is the only path that zeroes them.

use crate::error::{AdmissionError, Result};
use crate::queue::ledger::LedgerEvent;
use crate::statistics::wait_time::AdmissionWaitStats;
use crate::types::{EntryStatus, QueueId, StatusCount, TransitionCounts};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Counters for one queue
#[derive(Debug, Default)]
pub struct QueueCounters {
    created: AtomicU64,
    admitted: AtomicU64,
    expired: AtomicU64,
    completed: AtomicU64,
    admission_wait: Mutex<AdmissionWaitStats>,
}

impl QueueCounters {
    fn record(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Created { .. } => {
                self.created.fetch_add(1, Ordering::Relaxed);
            }
            LedgerEvent::Admitted { waited, .. } => {
                self.admitted.fetch_add(1, Ordering::Relaxed);
                let waited = waited.to_std().unwrap_or_default();
                // Best effort: a poisoned sample lock only loses the sample
                if let Ok(mut stats) = self.admission_wait.lock() {
                    stats.add_sample(waited);
                }
            }
            LedgerEvent::Expired { .. } => {
                self.expired.fetch_add(1, Ordering::Relaxed);
            }
            LedgerEvent::Completed { .. } => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            // Leaving without a terminal transition is not a status
            LedgerEvent::Exited { .. } | LedgerEvent::Abandoned { .. } => {}
        }
    }

    fn reset(&self) {
        self.created.store(0, Ordering::Relaxed);
        self.admitted.store(0, Ordering::Relaxed);
        self.expired.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        if let Ok(mut stats) = self.admission_wait.lock() {
            *stats = AdmissionWaitStats::default();
        }
    }

    pub fn transitions(&self) -> TransitionCounts {
        TransitionCounts {
            created: self.created.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }

    /// Every entry ever created, classified by the furthest status it reached
    pub fn status_counts(&self) -> Vec<StatusCount> {
        let t = self.transitions();
        let terminal = t.expired + t.completed;

        EntryStatus::ALL
            .iter()
            .map(|status| {
                let count = match status {
                    EntryStatus::Waiting => t.created.saturating_sub(t.admitted),
                    EntryStatus::Enterable => t.admitted.saturating_sub(terminal),
                    EntryStatus::Expired => t.expired,
                    EntryStatus::Completed => t.completed,
                };
                StatusCount {
                    status: *status,
                    count,
                }
            })
            .collect()
    }

    pub fn admission_wait(&self) -> AdmissionWaitStats {
        self.admission_wait
            .lock()
            .map(|stats| *stats)
            .unwrap_or_default()
    }
}

/// Trait for recording ledger transitions into long-lived statistics
pub trait StatisticsTracker: Send + Sync {
    /// Start counting for a new queue
    fn register(&self, queue_id: QueueId) -> Result<()>;

    /// Record a batch of ledger events for a queue; must never fail the caller
    fn record_events(&self, queue_id: QueueId, events: &[LedgerEvent]);

    /// Counters for a queue, if any were ever recorded
    fn counters(&self, queue_id: QueueId) -> Result<Option<Arc<QueueCounters>>>;

    /// Zero all counters for a queue
    fn reset(&self, queue_id: QueueId) -> Result<()>;

    /// Drop a queue's counters entirely
    fn remove(&self, queue_id: QueueId) -> Result<()>;
}

/// In-memory statistics accumulator
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    queues: RwLock<HashMap<QueueId, Arc<QueueCounters>>>,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

}

impl StatisticsTracker for StatisticsAccumulator {
    fn register(&self, queue_id: QueueId) -> Result<()> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| AdmissionError::lock_poisoned("statistics"))?;
        queues.entry(queue_id).or_default();
        Ok(())
    }

    fn record_events(&self, queue_id: QueueId, events: &[LedgerEvent]) {
        if events.is_empty() {
            return;
        }

        let counters = match self.counters(queue_id) {
            Ok(Some(counters)) => counters,
            Ok(None) => {
                debug!(
                    "Dropping {} statistics events for unregistered queue {}",
                    events.len(),
                    queue_id
                );
                return;
            }
            Err(e) => {
                warn!(
                    "Dropping {} statistics events for queue {}: {}",
                    events.len(),
                    queue_id,
                    e
                );
                return;
            }
        };

        for event in events {
            counters.record(event);
        }
    }

    fn counters(&self, queue_id: QueueId) -> Result<Option<Arc<QueueCounters>>> {
        let queues = self
            .queues
            .read()
            .map_err(|_| AdmissionError::lock_poisoned("statistics"))?;
        Ok(queues.get(&queue_id).cloned())
    }

    fn reset(&self, queue_id: QueueId) -> Result<()> {
        if let Some(counters) = self.counters(queue_id)? {
            counters.reset();
        }
        Ok(())
    }

    fn remove(&self, queue_id: QueueId) -> Result<()> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| AdmissionError::lock_poisoned("statistics"))?;
        queues.remove(&queue_id);
        Ok(())
    }
}

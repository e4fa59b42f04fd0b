//! Queue registry: lifecycle of queues and per-queue serialized access
//!
//! Every queue lives behind its own mutex so that admission decisions on one
//! queue never wait on another. The registry map itself is only locked long
//! enough to find or insert a handle.

use crate::error::{AdmissionError, Result};
use crate::metrics::MetricsCollector;
use crate::queue::ledger::{AdmissionLedger, LedgerEvent, SweepPolicy, SweepReport};
use crate::queue::provider::QueueProvider;
use crate::statistics::StatisticsTracker;
use crate::types::{
    CreateQueueRequest, EntryView, PerformanceId, QueueFilter, QueueId, QueueLimits,
    QueueStatistics, QueueSummary, QueueType, ScheduleId, UpdateQueueRequest,
};
use crate::utils::{generate_queue_id, Clock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Mutable part of a queue, guarded by one mutex
#[derive(Debug)]
struct QueueState {
    ledger: AdmissionLedger,
    updated_at: DateTime<Utc>,
    /// Set by delete; stale handles must not record anything afterwards
    removed: bool,
}

/// One registered queue
#[derive(Debug)]
pub struct QueueHandle {
    queue_id: QueueId,
    performance_id: PerformanceId,
    schedule_id: Option<ScheduleId>,
    queue_type: QueueType,
    created_at: DateTime<Utc>,
    state: Mutex<QueueState>,
}

impl QueueHandle {
    fn new(
        queue_id: QueueId,
        performance_id: PerformanceId,
        schedule_id: Option<ScheduleId>,
        queue_type: QueueType,
        limits: QueueLimits,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            queue_id,
            performance_id,
            schedule_id,
            queue_type,
            created_at: now,
            state: Mutex::new(QueueState {
                ledger: AdmissionLedger::new(queue_id, limits),
                updated_at: now,
                removed: false,
            }),
        }
    }

    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        Ok(self
            .state
            .lock()
            .map_err(|_| AdmissionError::lock_poisoned("queue"))?)
    }

    /// Lock a queue that is still registered
    fn lock_live(&self) -> Result<MutexGuard<'_, QueueState>> {
        let state = self.lock()?;
        if state.removed {
            return Err(AdmissionError::QueueNotFound {
                queue_id: self.queue_id.to_string(),
            }
            .into());
        }
        Ok(state)
    }

    fn summary_of(&self, state: &QueueState) -> QueueSummary {
        let limits = state.ledger.limits();
        QueueSummary {
            queue_id: self.queue_id,
            performance_id: self.performance_id.clone(),
            schedule_id: self.schedule_id.clone(),
            queue_type: self.queue_type,
            max_active_users: limits.max_active_users,
            entry_ttl_minutes: limits.entry_ttl_minutes,
            current_waiting: state.ledger.waiting_count() as u64,
            current_enterable: state.ledger.enterable_count() as u64,
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Snapshot of configuration and live counts
    pub fn summary(&self) -> Result<QueueSummary> {
        let state = self.lock()?;
        Ok(self.summary_of(&state))
    }
}

/// Owns every queue and routes operations to the right ledger
pub struct QueueRegistry {
    queues: RwLock<HashMap<QueueId, Arc<QueueHandle>>>,
    provider: Arc<dyn QueueProvider>,
    statistics: Arc<dyn StatisticsTracker>,
    metrics: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    sweep_policy: SweepPolicy,
    auto_create_on_start_booking: bool,
}

impl QueueRegistry {
    /// Create a registry with its own statistics and metrics
    pub fn new(provider: Arc<dyn QueueProvider>, clock: Arc<dyn Clock>) -> Result<Self> {
        let statistics = Arc::new(crate::statistics::StatisticsAccumulator::new());
        let metrics = Arc::new(MetricsCollector::new()?);
        Ok(Self::with_components(provider, statistics, metrics, clock))
    }

    /// Create a registry from explicit components
    pub fn with_components(
        provider: Arc<dyn QueueProvider>,
        statistics: Arc<dyn StatisticsTracker>,
        metrics: Arc<MetricsCollector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            provider,
            statistics,
            metrics,
            clock,
            sweep_policy: SweepPolicy::default(),
            auto_create_on_start_booking: true,
        }
    }

    pub fn with_sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.sweep_policy = policy;
        self
    }

    pub fn with_auto_create(mut self, enabled: bool) -> Self {
        self.auto_create_on_start_booking = enabled;
        self
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Number of registered queues
    pub fn queue_count(&self) -> Result<usize> {
        let queues = self
            .queues
            .read()
            .map_err(|_| AdmissionError::lock_poisoned("registry"))?;
        Ok(queues.len())
    }

    fn handle(&self, queue_id: QueueId) -> Result<Arc<QueueHandle>> {
        let queues = self
            .queues
            .read()
            .map_err(|_| AdmissionError::lock_poisoned("registry"))?;
        queues.get(&queue_id).cloned().ok_or_else(|| {
            AdmissionError::QueueNotFound {
                queue_id: queue_id.to_string(),
            }
            .into()
        })
    }

    fn handles(&self) -> Result<Vec<Arc<QueueHandle>>> {
        let queues = self
            .queues
            .read()
            .map_err(|_| AdmissionError::lock_poisoned("registry"))?;
        Ok(queues.values().cloned().collect())
    }

    /// Record what a ledger operation did; the caller holds the queue lock,
    /// so a concurrent reset or delete never sees half of a batch
    fn publish(&self, handle: &QueueHandle, state: &QueueState, events: &[LedgerEvent]) {
        if !events.is_empty() {
            self.statistics.record_events(handle.queue_id, events);
            self.metrics.record_events(handle.queue_type, events);
        }
        self.metrics.update_queue_depth(
            handle.queue_id,
            state.ledger.waiting_count(),
            state.ledger.enterable_count(),
        );
    }

    /// Run a closure against one queue's ledger and publish its events
    fn with_ledger<T>(
        &self,
        handle: &QueueHandle,
        op: impl FnOnce(&mut AdmissionLedger, DateTime<Utc>, &mut Vec<LedgerEvent>) -> T,
    ) -> Result<T> {
        let mut events = Vec::new();
        let mut state = handle.lock_live()?;
        let now = self.clock.now();
        let result = op(&mut state.ledger, now, &mut events);
        self.publish(handle, &state, &events);
        Ok(result)
    }

    // ----- admin surface -----

    /// Create a queue; one per performance and queue type
    pub async fn create_queue(&self, request: CreateQueueRequest) -> Result<QueueSummary> {
        if request.performance_id.trim().is_empty() {
            return Err(AdmissionError::InvalidConfiguration {
                reason: "performanceId must not be empty".to_string(),
            }
            .into());
        }
        let limits = QueueLimits::new(request.max_active_users, request.entry_ttl_minutes);
        self.provider.validate_limits(&limits)?;

        let handle = self.insert_queue(
            request.performance_id,
            request.schedule_id,
            request.queue_type,
            limits,
        )?;

        info!(
            "Created {} queue {} for performance '{}' (max active: {}, ttl: {}m)",
            handle.queue_type,
            handle.queue_id,
            handle.performance_id,
            limits.max_active_users,
            limits.entry_ttl_minutes
        );
        handle.summary()
    }

    fn insert_queue(
        &self,
        performance_id: PerformanceId,
        schedule_id: Option<ScheduleId>,
        queue_type: QueueType,
        limits: QueueLimits,
    ) -> Result<Arc<QueueHandle>> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| AdmissionError::lock_poisoned("registry"))?;

        let duplicate = queues
            .values()
            .any(|q| q.performance_id == performance_id && q.queue_type == queue_type);
        if duplicate {
            return Err(AdmissionError::DuplicateQueue {
                performance_id,
                queue_type: queue_type.to_string(),
            }
            .into());
        }

        let queue_id = generate_queue_id();
        let handle = Arc::new(QueueHandle::new(
            queue_id,
            performance_id,
            schedule_id,
            queue_type,
            limits,
            self.clock.now(),
        ));

        // Counters exist before the first join can reach the queue
        self.statistics.register(queue_id)?;
        self.metrics.record_queue_created(queue_type);
        self.metrics.update_queue_depth(queue_id, 0, 0);
        queues.insert(queue_id, handle.clone());
        Ok(handle)
    }

    /// Change limits without touching live entries
    pub async fn update_queue(
        &self,
        queue_id: QueueId,
        patch: UpdateQueueRequest,
    ) -> Result<QueueSummary> {
        let handle = self.handle(queue_id)?;

        let mut events = Vec::new();
        let (summary, promoted) = {
            let mut state = handle.lock_live()?;
            let current = state.ledger.limits();
            let limits = QueueLimits::new(
                patch.max_active_users.unwrap_or(current.max_active_users),
                patch.entry_ttl_minutes.unwrap_or(current.entry_ttl_minutes),
            );
            self.provider.validate_limits(&limits)?;

            let now = self.clock.now();
            let promoted = state.ledger.update_limits(limits, now, &mut events);
            state.updated_at = now;
            self.publish(&handle, &state, &events);
            (handle.summary_of(&state), promoted)
        };

        info!(
            "Updated queue {} (max active: {}, ttl: {}m, promoted: {})",
            queue_id, summary.max_active_users, summary.entry_ttl_minutes, promoted
        );
        Ok(summary)
    }

    /// Drop all live entries and zero the counters; configuration stays
    pub async fn reset_queue(&self, queue_id: QueueId) -> Result<QueueSummary> {
        let handle = self.handle(queue_id)?;

        let (summary, cleared) = {
            let mut state = handle.lock_live()?;
            let cleared = state.ledger.clear();
            state.updated_at = self.clock.now();
            self.statistics.reset(queue_id)?;
            self.metrics.update_queue_depth(queue_id, 0, 0);
            (handle.summary_of(&state), cleared)
        };

        warn!("Reset queue {} - dropped {} live entries", queue_id, cleared);
        Ok(summary)
    }

    /// Remove a queue with its entries and counters
    pub async fn delete_queue(&self, queue_id: QueueId) -> Result<()> {
        let handle = {
            let mut queues = self
                .queues
                .write()
                .map_err(|_| AdmissionError::lock_poisoned("registry"))?;
            queues
                .remove(&queue_id)
                .ok_or_else(|| AdmissionError::QueueNotFound {
                    queue_id: queue_id.to_string(),
                })?
        };

        let cleared = {
            let mut state = handle.lock()?;
            state.removed = true;
            let cleared = state.ledger.clear();
            self.statistics.remove(queue_id)?;
            self.metrics.record_queue_deleted(queue_id, handle.queue_type);
            cleared
        };

        info!(
            "Deleted queue {} ({} live entries purged)",
            queue_id, cleared
        );
        Ok(())
    }

    /// Summaries of every queue matching the filter, oldest first
    pub async fn list_queues(&self, filter: &QueueFilter) -> Result<Vec<QueueSummary>> {
        let mut summaries = Vec::new();
        for handle in self.handles()? {
            if filter.matches(&handle.performance_id, handle.queue_type) {
                summaries.push(handle.summary()?);
            }
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.queue_id.cmp(&b.queue_id))
        });
        Ok(summaries)
    }

    pub async fn get_queue(&self, queue_id: QueueId) -> Result<QueueSummary> {
        self.handle(queue_id)?.summary()
    }

    /// Live counts from the ledger next to all-time counts from statistics
    pub async fn statistics(&self, queue_id: QueueId) -> Result<QueueStatistics> {
        let summary = self.get_queue(queue_id).await?;
        let counters = self.statistics.counters(queue_id)?;

        let (status_counts, transitions, admission_wait) = match counters {
            Some(counters) => (
                counters.status_counts(),
                counters.transitions(),
                counters.admission_wait().summary(),
            ),
            None => {
                let empty = crate::statistics::QueueCounters::default();
                (
                    empty.status_counts(),
                    empty.transitions(),
                    empty.admission_wait().summary(),
                )
            }
        };

        Ok(QueueStatistics {
            queue_id,
            current_waiting: summary.current_waiting,
            current_enterable: summary.current_enterable,
            max_active_users: summary.max_active_users,
            total_entries: status_counts.iter().map(|c| c.count).sum(),
            status_counts,
            transitions,
            admission_wait,
        })
    }

    // ----- client surface -----

    pub async fn join(&self, queue_id: QueueId, subject_id: &str) -> Result<EntryView> {
        let handle = self.handle(queue_id)?;
        let view = self.with_ledger(&handle, |ledger, now, events| {
            ledger.join(subject_id, now, events)
        })?;
        debug!(
            "Subject '{}' joined queue {} as {:?} (rank: {:?})",
            subject_id, queue_id, view.status, view.my_rank
        );
        Ok(view)
    }

    pub async fn position(&self, queue_id: QueueId, subject_id: &str) -> Result<EntryView> {
        let handle = self.handle(queue_id)?;
        self.with_ledger(&handle, |ledger, now, events| {
            ledger.position(subject_id, now, events)
        })
    }

    /// Leave a queue; returns whether an entry was removed
    pub async fn exit(&self, queue_id: QueueId, subject_id: &str) -> Result<bool> {
        let handle = self.handle(queue_id)?;
        let removed = self.with_ledger(&handle, |ledger, now, events| {
            ledger.exit(subject_id, now, events)
        })?;
        if removed {
            debug!("Subject '{}' exited queue {}", subject_id, queue_id);
        }
        Ok(removed)
    }

    pub async fn complete(&self, queue_id: QueueId, subject_id: &str) -> Result<EntryView> {
        let handle = self.handle(queue_id)?;
        let view = self.with_ledger(&handle, |ledger, now, events| {
            ledger.complete(subject_id, now, events)
        })??;
        info!(
            "Subject '{}' completed booking in queue {}",
            subject_id, queue_id
        );
        Ok(view)
    }

    /// Join the booking queue of a schedule, opening it if allowed
    pub async fn start_booking(&self, schedule_id: &str, subject_id: &str) -> Result<EntryView> {
        let handle = self.booking_queue_for(schedule_id)?;
        self.join(handle.queue_id, subject_id).await
    }

    fn booking_queue_for(&self, schedule_id: &str) -> Result<Arc<QueueHandle>> {
        let handles = self.handles()?;

        if let Some(handle) = handles.iter().find(|h| {
            h.queue_type == QueueType::BookingOrder && h.schedule_id.as_deref() == Some(schedule_id)
        }) {
            return Ok(handle.clone());
        }

        let not_found = || AdmissionError::QueueNotFound {
            queue_id: format!("schedule:{}", schedule_id),
        };
        let performance_id = self
            .provider
            .performance_for_schedule(schedule_id)
            .ok_or_else(not_found)?;

        if let Some(handle) = handles.iter().find(|h| {
            h.queue_type == QueueType::BookingOrder && h.performance_id == performance_id
        }) {
            return Ok(handle.clone());
        }

        if !self.auto_create_on_start_booking {
            return Err(not_found().into());
        }

        let limits = self.provider.default_limits(QueueType::BookingOrder);
        match self.insert_queue(
            performance_id.clone(),
            Some(schedule_id.to_string()),
            QueueType::BookingOrder,
            limits,
        ) {
            Ok(handle) => {
                info!(
                    "Opened booking queue {} for schedule '{}' of performance '{}'",
                    handle.queue_id, schedule_id, performance_id
                );
                Ok(handle)
            }
            // Another request opened it between our scan and the insert
            Err(e) if matches!(
                e.downcast_ref::<AdmissionError>(),
                Some(AdmissionError::DuplicateQueue { .. })
            ) =>
            {
                self.handles()?
                    .into_iter()
                    .find(|h| {
                        h.queue_type == QueueType::BookingOrder
                            && h.performance_id == performance_id
                    })
                    .ok_or_else(|| not_found().into())
            }
            Err(e) => Err(e),
        }
    }

    // ----- maintenance -----

    /// Sweep every queue, one lock at a time
    pub async fn sweep_all(&self) -> Result<SweepReport> {
        let mut total = SweepReport::default();
        for handle in self.handles()? {
            let policy = self.sweep_policy;
            let swept = self.with_ledger(&handle, |ledger, now, events| {
                ledger.sweep(now, &policy, events)
            });
            let report = match swept {
                Ok(report) => report,
                // Deleted after the handle snapshot was taken
                Err(e) if matches!(
                    e.downcast_ref::<AdmissionError>(),
                    Some(AdmissionError::QueueNotFound { .. })
                ) =>
                {
                    continue
                }
                Err(e) => return Err(e),
            };
            if !report.is_empty() {
                debug!(
                    "Swept queue {}: {} expired, {} abandoned, {} promoted",
                    handle.queue_id, report.expired, report.abandoned, report.promoted
                );
            }
            total.merge(report);
        }
        Ok(total)
    }
}

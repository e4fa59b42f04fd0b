//! Admission ledger: the waiting line and admitted set of one queue
//!
//! The ledger is a plain data structure with no locking and no clock of its
//! own. Callers serialize access (one mutex per queue in the registry) and
//! pass `now` into every operation. Each state change is reported as a
//! [`LedgerEvent`] so statistics and metrics can be recorded after the lock
//! is released.

use crate::error::{AdmissionError, Result};
use crate::queue::rank::RankIndex;
use crate::types::{EntryStatus, EntryView, PositionStatus, QueueId, QueueLimits, SubjectId};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// State change observed inside the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// A new entry was created with the given initial status
    Created {
        subject_id: SubjectId,
        status: EntryStatus,
    },
    /// An entry became Enterable after waiting `waited`
    Admitted { subject_id: SubjectId, waited: Duration },
    /// An admitted entry ran out of its admission window
    Expired { subject_id: SubjectId },
    /// An admitted entry finished booking
    Completed { subject_id: SubjectId },
    /// The subject left the queue explicitly
    Exited {
        subject_id: SubjectId,
        status: EntryStatus,
    },
    /// A waiting entry stopped polling and was reclaimed
    Abandoned { subject_id: SubjectId },
}

/// Live entry in the ledger; only Waiting or Enterable
#[derive(Debug, Clone)]
struct LedgerEntry {
    status: EntryStatus,
    sequence: u64,
    enqueued_at: DateTime<Utc>,
    admitted_at: Option<DateTime<Utc>>,
    last_seen_at: DateTime<Utc>,
}

/// Terminal status kept briefly so a polling client learns why it left
#[derive(Debug, Clone, Copy)]
struct RecentOutcome {
    status: EntryStatus,
    at: DateTime<Utc>,
}

/// How a sweep treats idle and finished entries
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    /// Waiting entries not polled for this long are auto-exited
    pub abandon_after: Option<Duration>,
    /// How long Expired/Completed outcomes stay visible to `position`
    pub outcome_retention: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            abandon_after: Some(Duration::seconds(30)),
            outcome_retention: Duration::minutes(10),
        }
    }
}

/// What a single sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub abandoned: usize,
    pub promoted: usize,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.expired += other.expired;
        self.abandoned += other.abandoned;
        self.promoted += other.promoted;
    }

    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.abandoned == 0 && self.promoted == 0
    }
}

/// Waiting line plus bounded admitted set for one queue
#[derive(Debug, Clone)]
pub struct AdmissionLedger {
    queue_id: QueueId,
    limits: QueueLimits,
    entries: HashMap<SubjectId, LedgerEntry>,
    /// Waiting line ordered by join sequence
    waiting: BTreeMap<u64, SubjectId>,
    /// Admitted set ordered by admission time, then sequence
    admitted: BTreeMap<(DateTime<Utc>, u64), SubjectId>,
    ranks: RankIndex,
    next_sequence: u64,
    recent_outcomes: HashMap<SubjectId, RecentOutcome>,
}

impl AdmissionLedger {
    pub fn new(queue_id: QueueId, limits: QueueLimits) -> Self {
        Self {
            queue_id,
            limits,
            entries: HashMap::new(),
            waiting: BTreeMap::new(),
            admitted: BTreeMap::new(),
            ranks: RankIndex::new(),
            next_sequence: 0,
            recent_outcomes: HashMap::new(),
        }
    }

    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    /// Number of entries currently waiting
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Number of entries currently admitted
    pub fn enterable_count(&self) -> usize {
        self.admitted.len()
    }

    fn has_free_slot(&self) -> bool {
        self.admitted.len() < self.limits.max_active_users as usize
    }

    fn deadline(&self, admitted_at: DateTime<Utc>) -> DateTime<Utc> {
        admitted_at + self.limits.entry_ttl()
    }

    /// Enter the line, or return the existing live entry unchanged
    pub fn join(
        &mut self,
        subject_id: &str,
        now: DateTime<Utc>,
        events: &mut Vec<LedgerEvent>,
    ) -> EntryView {
        self.expire_if_due(subject_id, now, events);

        if let Some(entry) = self.entries.get_mut(subject_id) {
            entry.last_seen_at = now;
            debug!(
                "Subject '{}' already in queue {} - returning existing entry",
                subject_id, self.queue_id
            );
            return self.view_of(subject_id);
        }

        self.recent_outcomes.remove(subject_id);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        // A newcomer may only skip the line when nobody is waiting
        let admit_now = self.has_free_slot() && self.waiting.is_empty();
        let status = if admit_now {
            EntryStatus::Enterable
        } else {
            EntryStatus::Waiting
        };

        self.entries.insert(
            subject_id.to_string(),
            LedgerEntry {
                status,
                sequence,
                enqueued_at: now,
                admitted_at: admit_now.then_some(now),
                last_seen_at: now,
            },
        );
        events.push(LedgerEvent::Created {
            subject_id: subject_id.to_string(),
            status,
        });

        if admit_now {
            self.admitted.insert((now, sequence), subject_id.to_string());
            events.push(LedgerEvent::Admitted {
                subject_id: subject_id.to_string(),
                waited: Duration::zero(),
            });
        } else {
            self.ranks.insert(sequence, self.waiting.keys().copied());
            self.waiting.insert(sequence, subject_id.to_string());
        }

        self.view_of(subject_id)
    }

    /// Current view of a subject; also counts as a liveness poll
    pub fn position(
        &mut self,
        subject_id: &str,
        now: DateTime<Utc>,
        events: &mut Vec<LedgerEvent>,
    ) -> EntryView {
        self.expire_if_due(subject_id, now, events);

        if let Some(entry) = self.entries.get_mut(subject_id) {
            entry.last_seen_at = now;
            return self.view_of(subject_id);
        }

        match self.recent_outcomes.get(subject_id) {
            Some(outcome) => EntryView {
                status: outcome.status.into(),
                ..EntryView::not_in_queue(self.queue_id, subject_id)
            },
            None => EntryView::not_in_queue(self.queue_id, subject_id),
        }
    }

    /// Leave the queue. Returns false when the subject had no entry.
    pub fn exit(
        &mut self,
        subject_id: &str,
        now: DateTime<Utc>,
        events: &mut Vec<LedgerEvent>,
    ) -> bool {
        self.recent_outcomes.remove(subject_id);

        let Some(status) = self.remove_entry(subject_id) else {
            return false;
        };

        events.push(LedgerEvent::Exited {
            subject_id: subject_id.to_string(),
            status,
        });

        if status == EntryStatus::Enterable {
            self.promote(now, events);
        }
        true
    }

    /// Finish an admitted entry and hand its slot to the next in line
    pub fn complete(
        &mut self,
        subject_id: &str,
        now: DateTime<Utc>,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<EntryView> {
        self.expire_if_due(subject_id, now, events);

        let status = match self.entries.get(subject_id) {
            Some(entry) => entry.status,
            None => {
                return Err(match self.recent_outcomes.get(subject_id) {
                    Some(outcome) => AdmissionError::PreconditionFailed {
                        reason: format!(
                            "Entry for '{}' is already {}",
                            subject_id, outcome.status
                        ),
                    },
                    None => AdmissionError::EntryNotFound {
                        queue_id: self.queue_id.to_string(),
                        subject_id: subject_id.to_string(),
                    },
                }
                .into());
            }
        };

        match status {
            EntryStatus::Enterable => {}
            EntryStatus::Waiting | EntryStatus::Expired | EntryStatus::Completed => {
                return Err(AdmissionError::PreconditionFailed {
                    reason: format!(
                        "Cannot complete entry for '{}' in status {}",
                        subject_id, status
                    ),
                }
                .into());
            }
        }

        let entry = self.entries.get(subject_id).cloned();
        self.remove_entry(subject_id);
        self.recent_outcomes.insert(
            subject_id.to_string(),
            RecentOutcome {
                status: EntryStatus::Completed,
                at: now,
            },
        );
        events.push(LedgerEvent::Completed {
            subject_id: subject_id.to_string(),
        });

        self.promote(now, events);

        Ok(EntryView {
            queue_id: self.queue_id,
            subject_id: subject_id.to_string(),
            status: PositionStatus::Completed,
            ahead_count: None,
            my_rank: None,
            enqueued_at: entry.as_ref().map(|e| e.enqueued_at),
            admitted_at: entry.as_ref().and_then(|e| e.admitted_at),
            expires_at: None,
        })
    }

    /// Admit waiting entries in join order while capacity allows
    pub fn promote(&mut self, now: DateTime<Utc>, events: &mut Vec<LedgerEvent>) -> usize {
        let mut promoted = 0;

        while self.has_free_slot() {
            let Some((sequence, subject_id)) = self.waiting.pop_first() else {
                break;
            };
            self.ranks.remove(sequence);

            let Some(entry) = self.entries.get_mut(&subject_id) else {
                continue;
            };
            entry.status = EntryStatus::Enterable;
            entry.admitted_at = Some(now);
            let waited = now - entry.enqueued_at;

            self.admitted.insert((now, sequence), subject_id.clone());
            events.push(LedgerEvent::Admitted { subject_id, waited });
            promoted += 1;
        }

        if promoted > 0 {
            debug!("Promoted {} entries in queue {}", promoted, self.queue_id);
        }
        promoted
    }

    /// Expire elapsed admissions, reclaim abandoned waiters, then backfill
    pub fn sweep(
        &mut self,
        now: DateTime<Utc>,
        policy: &SweepPolicy,
        events: &mut Vec<LedgerEvent>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        // Admitted set is ordered by admission time, so deadlines are too
        let ttl = self.limits.entry_ttl();
        let due: Vec<SubjectId> = self
            .admitted
            .iter()
            .take_while(|((admitted_at, _), _)| *admitted_at + ttl <= now)
            .map(|(_, subject_id)| subject_id.clone())
            .collect();
        for subject_id in due {
            self.expire(&subject_id, now, events);
            report.expired += 1;
        }

        if let Some(abandon_after) = policy.abandon_after {
            let idle: Vec<SubjectId> = self
                .waiting
                .values()
                .filter(|subject_id| {
                    self.entries
                        .get(*subject_id)
                        .is_some_and(|entry| entry.last_seen_at + abandon_after <= now)
                })
                .cloned()
                .collect();
            for subject_id in idle {
                self.remove_entry(&subject_id);
                events.push(LedgerEvent::Abandoned { subject_id });
                report.abandoned += 1;
            }
        }

        let retention = policy.outcome_retention;
        self.recent_outcomes
            .retain(|_, outcome| outcome.at + retention > now);

        report.promoted = self.promote(now, events);
        report
    }

    /// Change capacity or admission window without touching live entries
    pub fn update_limits(
        &mut self,
        limits: QueueLimits,
        now: DateTime<Utc>,
        events: &mut Vec<LedgerEvent>,
    ) -> usize {
        self.limits = limits;
        // Shrinking never evicts; growing may admit immediately
        self.promote(now, events)
    }

    /// Drop every live entry without recording any transition
    pub fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        self.waiting.clear();
        self.admitted.clear();
        self.ranks.clear();
        self.recent_outcomes.clear();
        cleared
    }

    /// Lazily expire one subject whose admission window has elapsed
    fn expire_if_due(
        &mut self,
        subject_id: &str,
        now: DateTime<Utc>,
        events: &mut Vec<LedgerEvent>,
    ) -> bool {
        let due = self.entries.get(subject_id).is_some_and(|entry| {
            entry.status == EntryStatus::Enterable
                && entry
                    .admitted_at
                    .is_some_and(|admitted_at| self.deadline(admitted_at) <= now)
        });

        if due {
            self.expire(subject_id, now, events);
            self.promote(now, events);
        }
        due
    }

    fn expire(&mut self, subject_id: &str, now: DateTime<Utc>, events: &mut Vec<LedgerEvent>) {
        if self.remove_entry(subject_id).is_some() {
            self.recent_outcomes.insert(
                subject_id.to_string(),
                RecentOutcome {
                    status: EntryStatus::Expired,
                    at: now,
                },
            );
            events.push(LedgerEvent::Expired {
                subject_id: subject_id.to_string(),
            });
        }
    }

    /// Remove a live entry from every index, returning its status
    fn remove_entry(&mut self, subject_id: &str) -> Option<EntryStatus> {
        let entry = self.entries.remove(subject_id)?;
        match entry.status {
            EntryStatus::Waiting => {
                self.waiting.remove(&entry.sequence);
                self.ranks.remove(entry.sequence);
            }
            EntryStatus::Enterable => {
                if let Some(admitted_at) = entry.admitted_at {
                    self.admitted.remove(&(admitted_at, entry.sequence));
                }
            }
            EntryStatus::Expired | EntryStatus::Completed => {}
        }
        Some(entry.status)
    }

    fn view_of(&self, subject_id: &str) -> EntryView {
        let Some(entry) = self.entries.get(subject_id) else {
            return EntryView::not_in_queue(self.queue_id, subject_id);
        };

        let (ahead_count, my_rank) = match entry.status {
            EntryStatus::Waiting => {
                let rank = self.ranks.rank(entry.sequence);
                (Some(rank.saturating_sub(1)), Some(rank))
            }
            EntryStatus::Enterable | EntryStatus::Expired | EntryStatus::Completed => {
                (None, None)
            }
        };

        EntryView {
            queue_id: self.queue_id,
            subject_id: subject_id.to_string(),
            status: entry.status.into(),
            ahead_count,
            my_rank,
            enqueued_at: Some(entry.enqueued_at),
            admitted_at: entry.admitted_at,
            expires_at: entry.admitted_at.map(|at| self.deadline(at)),
        }
    }

    /// Verify internal indexes agree with each other
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        // A free slot never sits idle while someone waits
        if self.has_free_slot() {
            assert!(self.waiting.is_empty());
        }
        assert_eq!(self.entries.len(), self.waiting.len() + self.admitted.len());
        for (rank, (sequence, subject_id)) in self.waiting.iter().enumerate() {
            let entry = &self.entries[subject_id];
            assert_eq!(entry.status, EntryStatus::Waiting);
            assert_eq!(entry.sequence, *sequence);
            assert_eq!(self.ranks.rank(*sequence), rank as u64 + 1);
        }
        for subject_id in self.admitted.values() {
            assert_eq!(self.entries[subject_id].status, EntryStatus::Enterable);
        }
    }
}

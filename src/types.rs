//! Common types used throughout the waiting room service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for queues
pub type QueueId = Uuid;

/// Identifier of the principal holding a place in a queue
pub type SubjectId = String;

/// Identifier of a performance owned by the catalog service
pub type PerformanceId = String;

/// Identifier of one dated schedule of a performance
pub type ScheduleId = String;

/// Kind of admission line a queue runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueType {
    BookingOrder,
    Lottery,
    Promotion,
}

impl QueueType {
    pub const ALL: [QueueType; 3] = [
        QueueType::BookingOrder,
        QueueType::Lottery,
        QueueType::Promotion,
    ];

    /// Lowercase label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            QueueType::BookingOrder => "booking_order",
            QueueType::Lottery => "lottery",
            QueueType::Promotion => "promotion",
        }
    }
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueType::BookingOrder => write!(f, "BOOKING_ORDER"),
            QueueType::Lottery => write!(f, "LOTTERY"),
            QueueType::Promotion => write!(f, "PROMOTION"),
        }
    }
}

impl std::str::FromStr for QueueType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "BOOKING_ORDER" | "BOOKINGORDER" => Ok(QueueType::BookingOrder),
            "LOTTERY" => Ok(QueueType::Lottery),
            "PROMOTION" => Ok(QueueType::Promotion),
            _ => Err(anyhow::anyhow!("Unknown queue type: {}", s)),
        }
    }
}

/// Stored status of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Waiting,
    Enterable,
    Expired,
    Completed,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 4] = [
        EntryStatus::Waiting,
        EntryStatus::Enterable,
        EntryStatus::Expired,
        EntryStatus::Completed,
    ];
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Waiting => write!(f, "WAITING"),
            EntryStatus::Enterable => write!(f, "ENTERABLE"),
            EntryStatus::Expired => write!(f, "EXPIRED"),
            EntryStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Status reported to a polling client; `NotInQueue` is never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    NotInQueue,
    Waiting,
    Enterable,
    Expired,
    Completed,
}

impl From<EntryStatus> for PositionStatus {
    fn from(status: EntryStatus) -> Self {
        match status {
            EntryStatus::Waiting => PositionStatus::Waiting,
            EntryStatus::Enterable => PositionStatus::Enterable,
            EntryStatus::Expired => PositionStatus::Expired,
            EntryStatus::Completed => PositionStatus::Completed,
        }
    }
}

/// Capacity and admission window of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueLimits {
    pub max_active_users: u32,
    pub entry_ttl_minutes: u32,
}

impl QueueLimits {
    pub fn new(max_active_users: u32, entry_ttl_minutes: u32) -> Self {
        Self {
            max_active_users,
            entry_ttl_minutes,
        }
    }

    /// Admission window as a chrono duration
    pub fn entry_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.entry_ttl_minutes as i64)
    }
}

/// One subject's view of its place in a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub queue_id: QueueId,
    pub subject_id: SubjectId,
    pub status: PositionStatus,
    /// Waiting entries ahead of this one; only set while waiting
    pub ahead_count: Option<u64>,
    /// 1-based rank in the waiting line; only set while waiting
    pub my_rank: Option<u64>,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntryView {
    /// View for a subject with no entry in the queue
    pub fn not_in_queue(queue_id: QueueId, subject_id: &str) -> Self {
        Self {
            queue_id,
            subject_id: subject_id.to_string(),
            status: PositionStatus::NotInQueue,
            ahead_count: None,
            my_rank: None,
            enqueued_at: None,
            admitted_at: None,
            expires_at: None,
        }
    }
}

/// Admin-facing description of a queue with its live counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub queue_id: QueueId,
    pub performance_id: PerformanceId,
    pub schedule_id: Option<ScheduleId>,
    pub queue_type: QueueType,
    pub max_active_users: u32,
    pub entry_ttl_minutes: u32,
    pub current_waiting: u64,
    pub current_enterable: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Number of entries classified under one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: EntryStatus,
    pub count: u64,
}

/// Raw monotonically increasing transition counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCounts {
    pub created: u64,
    pub admitted: u64,
    pub expired: u64,
    pub completed: u64,
}

/// Summary of how long admitted subjects waited in line
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionWaitSummary {
    pub samples: u64,
    pub mean_seconds: f64,
    pub min_seconds: f64,
    pub max_seconds: f64,
}

/// Statistics for one queue; live counts and all-time counts come from
/// different sources and are reported side by side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatistics {
    pub queue_id: QueueId,
    pub current_waiting: u64,
    pub current_enterable: u64,
    pub max_active_users: u32,
    pub status_counts: Vec<StatusCount>,
    pub total_entries: u64,
    pub transitions: TransitionCounts,
    pub admission_wait: AdmissionWaitSummary,
}

/// Request to create a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueueRequest {
    pub performance_id: PerformanceId,
    #[serde(default)]
    pub schedule_id: Option<ScheduleId>,
    pub queue_type: QueueType,
    pub max_active_users: u32,
    pub entry_ttl_minutes: u32,
}

/// Partial update of a queue's limits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQueueRequest {
    #[serde(default)]
    pub max_active_users: Option<u32>,
    #[serde(default)]
    pub entry_ttl_minutes: Option<u32>,
}

/// Filter for listing queues
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueFilter {
    #[serde(default)]
    pub performance_id: Option<PerformanceId>,
    #[serde(default)]
    pub queue_type: Option<QueueType>,
}

impl QueueFilter {
    pub fn matches(&self, performance_id: &str, queue_type: QueueType) -> bool {
        self.performance_id
            .as_deref()
            .map_or(true, |wanted| wanted == performance_id)
            && self.queue_type.map_or(true, |wanted| wanted == queue_type)
    }
}

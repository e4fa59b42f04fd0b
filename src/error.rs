//! Error types for the waiting room service
//!
//! Core operations return `anyhow::Result` for consistent propagation; the
//! specific failure kinds below are attached so the HTTP layer can downcast
//! them and choose a status code.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific admission-control scenarios
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Queue not found: {queue_id}")]
    QueueNotFound { queue_id: String },

    #[error("Entry not found: subject '{subject_id}' in queue {queue_id}")]
    EntryNotFound {
        queue_id: String,
        subject_id: String,
    },

    #[error("Queue already exists for performance '{performance_id}' ({queue_type})")]
    DuplicateQueue {
        performance_id: String,
        queue_type: String,
    },

    #[error("Precondition failed: {reason}")]
    PreconditionFailed { reason: String },

    #[error("Invalid queue configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl AdmissionError {
    /// Lock poisoning means another thread panicked mid-mutation
    pub(crate) fn lock_poisoned(what: &str) -> Self {
        AdmissionError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }

    /// Whether a caller may retry the same request without re-reading state
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdmissionError::StorageFailure { .. })
    }
}

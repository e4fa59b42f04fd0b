//! Request handlers for the queue API

use crate::gateway::context::{AdminGuard, QueuePath, SubjectContext};
use crate::gateway::error::ApiError;
use crate::gateway::GatewayState;
use crate::types::{
    CreateQueueRequest, EntryView, QueueFilter, QueueId, QueueStatistics, QueueSummary,
    ScheduleId, SubjectId, UpdateQueueRequest,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Position of a subject plus the poll cadence the client should keep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    #[serde(flatten)]
    pub entry: EntryView,
    pub poll_interval_seconds: u64,
}

/// Result of leaving a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResponse {
    pub queue_id: QueueId,
    pub subject_id: SubjectId,
    /// False when the subject had no entry
    pub removed: bool,
}

// ----- admin -----

pub async fn create_queue(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    payload: Result<Json<CreateQueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueueSummary>), ApiError> {
    let Json(request) = payload?;
    let summary = state.registry.create_queue(request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn list_queues(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    filter: Result<Query<QueueFilter>, QueryRejection>,
) -> Result<Json<Vec<QueueSummary>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.registry.list_queues(&filter).await?))
}

pub async fn get_queue(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
) -> Result<Json<QueueSummary>, ApiError> {
    Ok(Json(state.registry.get_queue(queue_id).await?))
}

pub async fn update_queue(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
    payload: Result<Json<UpdateQueueRequest>, JsonRejection>,
) -> Result<Json<QueueSummary>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(state.registry.update_queue(queue_id, patch).await?))
}

pub async fn delete_queue(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_queue(queue_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_queue(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
) -> Result<Json<QueueSummary>, ApiError> {
    Ok(Json(state.registry.reset_queue(queue_id).await?))
}

pub async fn queue_statistics(
    _admin: AdminGuard,
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
) -> Result<Json<QueueStatistics>, ApiError> {
    Ok(Json(state.registry.statistics(queue_id).await?))
}

// ----- client -----

pub async fn start_booking(
    State(state): State<GatewayState>,
    Path(schedule_id): Path<ScheduleId>,
    subject: SubjectContext,
) -> Result<Json<EntryView>, ApiError> {
    debug!(
        "Start booking for schedule '{}' by '{}'",
        schedule_id, subject.subject_id
    );
    Ok(Json(
        state
            .registry
            .start_booking(&schedule_id, &subject.subject_id)
            .await?,
    ))
}

pub async fn join_queue(
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
    subject: SubjectContext,
) -> Result<Json<EntryView>, ApiError> {
    Ok(Json(
        state.registry.join(queue_id, &subject.subject_id).await?,
    ))
}

pub async fn queue_position(
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
    subject: SubjectContext,
) -> Result<Json<PositionResponse>, ApiError> {
    let entry = state
        .registry
        .position(queue_id, &subject.subject_id)
        .await?;
    Ok(Json(PositionResponse {
        entry,
        poll_interval_seconds: state.poll_interval_seconds,
    }))
}

pub async fn exit_queue(
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
    subject: SubjectContext,
) -> Result<Json<ExitResponse>, ApiError> {
    let removed = state.registry.exit(queue_id, &subject.subject_id).await?;
    Ok(Json(ExitResponse {
        queue_id,
        subject_id: subject.subject_id,
        removed,
    }))
}

pub async fn complete_entry(
    State(state): State<GatewayState>,
    QueuePath(queue_id): QueuePath,
    subject: SubjectContext,
) -> Result<Json<EntryView>, ApiError> {
    Ok(Json(
        state
            .registry
            .complete(queue_id, &subject.subject_id)
            .await?,
    ))
}

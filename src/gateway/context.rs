//! Request context extractors
//!
//! Identity arrives with every call as explicit request context: the
//! subject in `X-Subject-Id`, admin access as a bearer token.

use crate::gateway::error::ApiError;
use crate::gateway::GatewayState;
use crate::types::{QueueId, SubjectId};
use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts},
};
use std::collections::HashMap;

/// Header carrying the requesting subject
pub const SUBJECT_HEADER: &str = "x-subject-id";

const MAX_SUBJECT_LEN: usize = 256;

/// The subject a client request acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectContext {
    pub subject_id: SubjectId,
}

impl<S> FromRequestParts<S> for SubjectContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let subject_id = parts
            .headers
            .get(SUBJECT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing X-Subject-Id header"))?;

        if subject_id.len() > MAX_SUBJECT_LEN {
            return Err(ApiError::bad_request(format!(
                "X-Subject-Id must be at most {} bytes",
                MAX_SUBJECT_LEN
            )));
        }

        Ok(Self {
            subject_id: subject_id.to_string(),
        })
    }
}

/// Proof that the caller may use admin routes
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard;

impl FromRequestParts<GatewayState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        // Admin routes are open when no token is configured
        let Some(expected) = state.admin_token.as_deref() else {
            return Ok(Self);
        };

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Expected 'Bearer <token>'"))?;

        if token != expected {
            return Err(ApiError::forbidden("Invalid admin token"));
        }
        Ok(Self)
    }
}

/// Queue id taken from the `{id}` path segment
#[derive(Debug, Clone, Copy)]
pub struct QueuePath(pub QueueId);

impl<S> FromRequestParts<S> for QueuePath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        let raw = params
            .get("id")
            .ok_or_else(|| ApiError::bad_request("Missing queue id"))?;
        let queue_id = raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Invalid queue id '{}'", raw)))?;
        Ok(Self(queue_id))
    }
}

//! HTTP error responses for the queue API
//!
//! Core operations return `anyhow::Error`; this module downcasts them to
//! [`AdmissionError`] to pick a status code and a stable error code.

use crate::error::AdmissionError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// Error returned by gateway handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<&AdmissionError> for ApiError {
    fn from(err: &AdmissionError) -> Self {
        let (status, code) = match err {
            AdmissionError::QueueNotFound { .. } => (StatusCode::NOT_FOUND, "QUEUE_NOT_FOUND"),
            AdmissionError::EntryNotFound { .. } => (StatusCode::NOT_FOUND, "ENTRY_NOT_FOUND"),
            AdmissionError::DuplicateQueue { .. } => (StatusCode::CONFLICT, "DUPLICATE_QUEUE"),
            AdmissionError::PreconditionFailed { .. } => {
                (StatusCode::PRECONDITION_FAILED, "PRECONDITION_FAILED")
            }
            AdmissionError::InvalidConfiguration { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            AdmissionError::StorageFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILURE")
            }
            AdmissionError::InternalError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        Self {
            retryable: err.is_retryable(),
            ..Self::new(status, code, err.to_string())
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<AdmissionError>() {
            Some(admission) => admission.into(),
            None => {
                error!("Unclassified error in request handler: {:#}", err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "INVALID_BODY", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), "INVALID_QUERY", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, code = self.code, "{}", self.message);
        } else {
            warn!(status = %self.status, code = self.code, "{}", self.message);
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
            retryable: self.retryable,
        };
        (self.status, Json(body)).into_response()
    }
}

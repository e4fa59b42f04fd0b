//! HTTP gateway for the waiting room
//!
//! Admin routes manage queues; client routes join, poll, exit and complete.
//! Every request carries its own identity context and nothing is kept
//! between requests.

pub mod context;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use context::{AdminGuard, QueuePath, SubjectContext, SUBJECT_HEADER};
pub use error::ApiError;
pub use handlers::{ExitResponse, PositionResponse};
pub use routes::create_router;
pub use server::{HttpServer, HttpServerConfig};

use crate::metrics::{health_router, HealthServerState};
use crate::queue::QueueRegistry;
use axum::Router;
use std::sync::Arc;

/// Shared state of the queue API
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<QueueRegistry>,
    /// Bearer token for admin routes; `None` leaves them open
    pub admin_token: Option<Arc<str>>,
    /// Poll cadence advertised to clients
    pub poll_interval_seconds: u64,
}

impl GatewayState {
    pub fn new(registry: Arc<QueueRegistry>) -> Self {
        Self {
            registry,
            admin_token: None,
            poll_interval_seconds: 3,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }

    pub fn with_poll_interval(mut self, seconds: u64) -> Self {
        self.poll_interval_seconds = seconds;
        self
    }
}

/// Queue API merged with health and metrics routes
pub fn app_router(gateway: GatewayState, health: HealthServerState) -> Router {
    create_router(gateway).merge(health_router(health))
}

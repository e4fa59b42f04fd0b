//! Test fixtures shared by the integration test binaries
#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use waiting_room::gateway::{app_router, GatewayState};
use waiting_room::metrics::HealthServerState;
use waiting_room::queue::{QueueRegistry, StaticQueueProvider, SweepPolicy};
use waiting_room::types::{CreateQueueRequest, QueueId, QueueType};
use waiting_room::utils::ManualClock;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const KNOWN_SCHEDULE: &str = "sch-100";
pub const KNOWN_PERFORMANCE: &str = "perf-100";

/// Registry on a manual clock, with abandonment switched off
pub struct TestSystem {
    pub registry: Arc<QueueRegistry>,
    pub clock: Arc<ManualClock>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_policy(SweepPolicy {
            abandon_after: None,
            outcome_retention: Duration::minutes(10),
        })
    }

    pub fn with_policy(policy: SweepPolicy) -> Self {
        let clock = Arc::new(ManualClock::default());
        let provider = StaticQueueProvider::new().with_schedule(KNOWN_SCHEDULE, KNOWN_PERFORMANCE);
        let registry = QueueRegistry::new(Arc::new(provider), clock.clone())
            .unwrap()
            .with_sweep_policy(policy);

        Self {
            registry: Arc::new(registry),
            clock,
        }
    }

    /// Create a booking queue and return its id
    pub async fn booking_queue(&self, performance_id: &str, max_active: u32, ttl: u32) -> QueueId {
        self.registry
            .create_queue(create_request(performance_id, QueueType::BookingOrder, max_active, ttl))
            .await
            .unwrap()
            .queue_id
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }
}

pub fn create_request(
    performance_id: &str,
    queue_type: QueueType,
    max_active_users: u32,
    entry_ttl_minutes: u32,
) -> CreateQueueRequest {
    CreateQueueRequest {
        performance_id: performance_id.to_string(),
        schedule_id: None,
        queue_type,
        max_active_users,
        entry_ttl_minutes,
    }
}

/// Full HTTP router over a test system
pub fn test_router(system: &TestSystem, admin_token: Option<&str>) -> axum::Router {
    let gateway = GatewayState::new(system.registry.clone())
        .with_admin_token(admin_token.map(str::to_string))
        .with_poll_interval(3);
    let health = HealthServerState::new(system.registry.metrics());
    app_router(gateway, health)
}

pub fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN_TOKEN));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn subject_request(method: &str, uri: &str, subject: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-subject-id", subject)
        .body(Body::empty())
        .unwrap()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

//! Route table for the queue API

use crate::gateway::handlers;
use crate::gateway::GatewayState;
use crate::metrics::MetricsCollector;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Admin and client routes under `/queues`
pub fn create_router(state: GatewayState) -> Router {
    let metrics = state.registry.metrics();

    Router::new()
        .route(
            "/queues",
            post(handlers::create_queue).get(handlers::list_queues),
        )
        .route(
            "/queues/start-booking/{schedule_id}",
            post(handlers::start_booking),
        )
        .route(
            "/queues/{id}",
            get(handlers::get_queue)
                .patch(handlers::update_queue)
                .delete(handlers::delete_queue),
        )
        .route("/queues/{id}/reset", post(handlers::reset_queue))
        .route("/queues/{id}/statistics", get(handlers::queue_statistics))
        .route("/queues/{id}/join", post(handlers::join_queue))
        .route("/queues/{id}/position", get(handlers::queue_position))
        .route("/queues/{id}/exit", post(handlers::exit_queue))
        .route("/queues/{id}/complete", post(handlers::complete_entry))
        .route_layer(middleware::from_fn_with_state(metrics, track_requests))
        .with_state(state)
}

/// Record count and latency per matched route
async fn track_requests(
    State(metrics): State<Arc<MetricsCollector>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let timer = metrics.start_timer();
    let response = next.run(request).await;
    metrics.record_request(&route, response.status().as_u16(), timer.stop());
    response
}

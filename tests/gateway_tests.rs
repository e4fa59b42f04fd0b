//! HTTP API tests against the full router, without binding a socket

mod fixtures;

use axum::http::StatusCode;
use fixtures::{
    admin_request, read_json, subject_request, test_router, TestSystem, ADMIN_TOKEN,
    KNOWN_SCHEDULE,
};
use serde_json::json;
use tower::ServiceExt;

async fn create_queue_via_api(router: &axum::Router, performance_id: &str, max: u32) -> String {
    let response = router
        .clone()
        .oneshot(admin_request(
            "POST",
            "/queues",
            Some(json!({
                "performanceId": performance_id,
                "queueType": "BOOKING_ORDER",
                "maxActiveUsers": max,
                "entryTtlMinutes": 10
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    body["queueId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_and_get_queue() {
    let system = TestSystem::new();
    let router = test_router(&system, Some(ADMIN_TOKEN));

    let queue_id = create_queue_via_api(&router, "perf-1", 2).await;

    let response = router
        .clone()
        .oneshot(admin_request("GET", &format!("/queues/{}", queue_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["performanceId"], "perf-1");
    assert_eq!(body["queueType"], "BOOKING_ORDER");
    assert_eq!(body["maxActiveUsers"], 2);
    assert_eq!(body["currentWaiting"], 0);
    assert_eq!(body["currentEnterable"], 0);
}

#[tokio::test]
async fn test_client_flow_over_http() {
    let system = TestSystem::new();
    let router = test_router(&system, Some(ADMIN_TOKEN));
    let queue_id = create_queue_via_api(&router, "perf-1", 1).await;

    let response = router
        .clone()
        .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), "alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ENTERABLE");

    let response = router
        .clone()
        .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), "bob"))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["status"], "WAITING");
    assert_eq!(body["myRank"], 1);
    assert_eq!(body["aheadCount"], 0);

    let response = router
        .clone()
        .oneshot(subject_request(
            "POST",
            &format!("/queues/{}/complete", queue_id),
            "alice",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "COMPLETED");

    let response = router
        .clone()
        .oneshot(subject_request(
            "GET",
            &format!("/queues/{}/position", queue_id),
            "bob",
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["status"], "ENTERABLE");
    assert_eq!(body["pollIntervalSeconds"], 3);
    assert!(body["myRank"].is_null());

    let response = router
        .clone()
        .oneshot(subject_request("POST", &format!("/queues/{}/exit", queue_id), "bob"))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["removed"], true);
    assert_eq!(body["subjectId"], "bob");

    let response = router
        .clone()
        .oneshot(subject_request(
            "GET",
            &format!("/queues/{}/position", queue_id),
            "carol",
        ))
        .await
        .unwrap();
    assert_eq!(read_json(response).await["status"], "NOT_IN_QUEUE");
}

#[tokio::test]
async fn test_statistics_endpoint() {
    let system = TestSystem::new();
    let router = test_router(&system, None);
    let queue_id = create_queue_via_api(&router, "perf-1", 1).await;

    for subject in ["a", "b", "c"] {
        router
            .clone()
            .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), subject))
            .await
            .unwrap();
    }

    let response = router
        .clone()
        .oneshot(admin_request(
            "GET",
            &format!("/queues/{}/statistics", queue_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["currentWaiting"], 2);
    assert_eq!(body["currentEnterable"], 1);
    assert_eq!(body["maxActiveUsers"], 1);
    assert_eq!(body["totalEntries"], 3);
    assert_eq!(body["statusCounts"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_start_booking_route() {
    let system = TestSystem::new();
    let router = test_router(&system, None);

    let response = router
        .clone()
        .oneshot(subject_request(
            "POST",
            &format!("/queues/start-booking/{}", KNOWN_SCHEDULE),
            "alice",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ENTERABLE");

    let response = router
        .clone()
        .oneshot(subject_request(
            "POST",
            "/queues/start-booking/sch-unknown",
            "alice",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["code"], "QUEUE_NOT_FOUND");
}

#[tokio::test]
async fn test_error_status_mapping() {
    let system = TestSystem::new();
    let router = test_router(&system, None);
    let queue_id = create_queue_via_api(&router, "perf-1", 1).await;

    // Duplicate queue
    let response = router
        .clone()
        .oneshot(admin_request(
            "POST",
            "/queues",
            Some(json!({
                "performanceId": "perf-1",
                "queueType": "BOOKING_ORDER",
                "maxActiveUsers": 3,
                "entryTtlMinutes": 10
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Invalid limits
    let response = router
        .clone()
        .oneshot(admin_request(
            "POST",
            "/queues",
            Some(json!({
                "performanceId": "perf-2",
                "queueType": "LOTTERY",
                "maxActiveUsers": 0,
                "entryTtlMinutes": 10
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Complete while waiting
    for subject in ["a", "b"] {
        router
            .clone()
            .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), subject))
            .await
            .unwrap();
    }
    let response = router
        .clone()
        .oneshot(subject_request(
            "POST",
            &format!("/queues/{}/complete", queue_id),
            "b",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    // Unknown queue
    let response = router
        .clone()
        .oneshot(subject_request(
            "GET",
            &format!("/queues/{}/position", uuid::Uuid::new_v4()),
            "a",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Malformed queue id
    let response = router
        .clone()
        .oneshot(subject_request("GET", "/queues/not-a-uuid/position", "a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing subject header
    let response = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri(format!("/queues/{}/join", queue_id))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_token_enforced() {
    let system = TestSystem::new();
    let router = test_router(&system, Some(ADMIN_TOKEN));

    let response = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/queues")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/queues")
                .header("authorization", "Bearer wrong")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(admin_request("GET", "/queues", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_filter_and_delete() {
    let system = TestSystem::new();
    let router = test_router(&system, None);
    let queue_id = create_queue_via_api(&router, "perf-1", 1).await;
    create_queue_via_api(&router, "perf-2", 1).await;

    let response = router
        .clone()
        .oneshot(admin_request("GET", "/queues?performanceId=perf-2", None))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["performanceId"], "perf-2");

    let response = router
        .clone()
        .oneshot(admin_request("GET", "/queues?queueType=LOTTERY", None))
        .await
        .unwrap();
    assert!(read_json(response).await.as_array().unwrap().is_empty());

    let response = router
        .clone()
        .oneshot(admin_request("GET", "/queues?queueType=RAFFLE", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .clone()
        .oneshot(admin_request("DELETE", &format!("/queues/{}", queue_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .clone()
        .oneshot(admin_request("GET", &format!("/queues/{}", queue_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_and_reset() {
    let system = TestSystem::new();
    let router = test_router(&system, None);
    let queue_id = create_queue_via_api(&router, "perf-1", 1).await;

    router
        .clone()
        .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), "a"))
        .await
        .unwrap();
    router
        .clone()
        .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), "b"))
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(admin_request(
            "PATCH",
            &format!("/queues/{}", queue_id),
            Some(json!({ "maxActiveUsers": 2 })),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["maxActiveUsers"], 2);
    assert_eq!(body["entryTtlMinutes"], 10);
    assert_eq!(body["currentEnterable"], 2);

    let response = router
        .clone()
        .oneshot(admin_request(
            "POST",
            &format!("/queues/{}/reset", queue_id),
            None,
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["currentEnterable"], 0);
    assert_eq!(body["maxActiveUsers"], 2);
}

#[tokio::test]
async fn test_metrics_and_health_routes_are_merged() {
    let system = TestSystem::new();
    let router = test_router(&system, None);
    let queue_id = create_queue_via_api(&router, "perf-1", 1).await;
    router
        .clone()
        .oneshot(subject_request("POST", &format!("/queues/{}/join", queue_id), "a"))
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/metrics")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("waiting_room_http_requests_total"));
    assert!(text.contains("/queues/{id}/join"));
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use rcommerce_api::middleware::OWNER_HEADER;
use rcommerce_api::state::AppState;
use rcommerce_core::jobs::clock::SystemClock;
use rcommerce_core::jobs::config::SchedulerConfig;
use rcommerce_core::jobs::queue::InMemoryDispatchQueue;
use rcommerce_core::jobs::store::InMemoryJobStore;
use rcommerce_core::jobs::{Scheduler, SchedulerMetrics};

type TestState = AppState<InMemoryJobStore, InMemoryDispatchQueue, SystemClock>;

fn test_router() -> Router {
    let scheduler = Scheduler::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(InMemoryDispatchQueue::new()),
        Arc::new(SystemClock),
        SchedulerConfig::default(),
        Arc::new(SchedulerMetrics::new()),
    );
    let state: TestState = AppState::new(Arc::new(scheduler));

    Router::new()
        .nest(
            "/api/v1",
            rcommerce_api::routes::jobs::router::<InMemoryJobStore, InMemoryDispatchQueue, SystemClock>(),
        )
        .with_state(state)
}

fn create_body() -> String {
    serde_json::json!({
        "name": "nightly-export",
        "kind": "recurring",
        "schedule": {"kind": "cron", "expression": "0 2 * * *"},
        "payload": {"table": "orders"}
    })
    .to_string()
}

#[tokio::test]
async fn test_create_and_get_job_round_trip() {
    let app = test_router();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/jobs")
                .header("content-type", "application/json")
                .header(OWNER_HEADER, "tenant-1")
                .body(Body::from(create_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let job: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = job["id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{}", id))
                .header(OWNER_HEADER, "tenant-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_owner_header_is_unauthorized() {
    let app = test_router();

    let response = app
        .oneshot(Request::builder().uri("/api/v1/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_unknown_job_is_not_found() {
    let app = test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{}", uuid::Uuid::new_v4()))
                .header(OWNER_HEADER, "tenant-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_job_with_past_scheduled_time_is_rejected() {
    let app = test_router();
    let body = serde_json::json!({
        "name": "stale",
        "kind": "one_time",
        "schedule": {"kind": "at", "at": "2000-01-01T00:00:00Z"},
        "payload": {}
    })
    .to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/jobs")
                .header("content-type", "application/json")
                .header(OWNER_HEADER, "tenant-1")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

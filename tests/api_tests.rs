//! Smoke tests for the HTTP surface.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use vidarr::config::Config;
use vidarr::state::SharedState;

async fn spawn_app() -> Router {
    let db_path = std::env::temp_dir().join(format!("vidarr-api-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.server.enabled = false;
    config.observability.metrics_enabled = false;

    let shared = SharedState::new(config)
        .await
        .expect("failed to create app state");
    vidarr::api::router(Arc::new(shared), None)
}

#[tokio::test]
async fn health_and_empty_listings() {
    let app = spawn_app().await;

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let movies = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/movies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(movies.status(), StatusCode::OK);
    let body = movies.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed, serde_json::json!([]));

    let jobs = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(jobs.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_add_movie_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/movies")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "tmdb_id": -1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn triggering_a_job_twice_conflicts() {
    let app = spawn_app().await;

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/jobs/trigger/movie_index")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/jobs/trigger/movie_index")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let unknown = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/jobs/trigger/definitely_not_a_job")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_endpoint_without_recorder_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

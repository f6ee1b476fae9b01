use axum::http::StatusCode;
use soul_agentd::api::{app, ApiState};
use soul_agentd::config::AppConfig;
use soul_agentd::state::AppState;
use std::sync::Arc;
use tower::ServiceExt;

fn make_state() -> ApiState {
    let mut config = AppConfig::default();
    config.vault_path = std::env::temp_dir().join(format!("soul-agent-it-{}", uuid::Uuid::new_v4()));
    Arc::new(AppState::new(config).unwrap())
}

fn make_app() -> axum::Router {
    app(make_state())
}

#[tokio::test]
async fn test_health() {
    let app = make_app();
    let req = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_note_then_service_status_counts_pending() {
    let state = make_state();
    let app = app(state.clone());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/note")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"text":"hello world"}"#))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(state.queue.pending_count(), 1);
}

#[tokio::test]
async fn test_post_note_rejects_empty_text() {
    let app = make_app();
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/note")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"text":""}"#))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_todo_list_empty_initially() {
    let app = make_app();
    let req = axum::http::Request::builder()
        .uri("/todo/list?status=active")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["todos"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_todo_progress_missing_returns_404() {
    let app = make_app();
    let req = axum::http::Request::builder()
        .uri("/todo/progress/deadbeef")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_service_status_ok() {
    let app = make_app();
    let req = axum::http::Request::builder()
        .uri("/service/status")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

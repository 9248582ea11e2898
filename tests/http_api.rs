mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use policyqa_backend::audit::{AuditOutcome, AuditRunner, AuditSpec, AuditStatus};
use policyqa_backend::core::config::AppPaths;
use policyqa_backend::core::security::{SessionToken, API_KEY_HEADER};
use policyqa_backend::server::router::router;
use policyqa_backend::state::AppState;

const TOKEN: &str = "test-session-token";

#[derive(Default)]
struct RecordingAudit {
    seen: Mutex<Vec<AuditSpec>>,
}

#[async_trait]
impl AuditRunner for RecordingAudit {
    async fn run(&self, spec: &AuditSpec) -> AuditOutcome {
        self.seen.lock().unwrap().push(spec.clone());
        AuditOutcome::new(AuditStatus::Pass, "8 of 8 cases passed")
    }
}

fn app(dir: &tempfile::TempDir, audit: Arc<RecordingAudit>) -> (axum::Router, Arc<AppState>) {
    let paths = Arc::new(AppPaths::rooted_at(dir.path()));
    let pipeline = Arc::new(common::context("Minimum 50 Mbps.", 0.9, 0.0));
    let state = AppState::from_parts(paths, SessionToken::new(TOKEN), pipeline, audit);
    (router(state.clone()), state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_lists_pipeline_parts() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(&dir, Arc::default());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["passages"], 1);
    assert_eq!(body["metric_backends"], json!(["stats", "judge"]));
}

#[tokio::test]
async fn predict_returns_answer_report_and_decision() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(&dir, Arc::default());

    let response = app
        .oneshot(post_json(
            "/api/predict",
            json!({"question": "What is the internet speed requirement?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["answer"], "Minimum 50 Mbps.");
    assert_eq!(body["decision"]["verdict"], "RELEASE");
    let rows = body["report"]["rows"].as_array().unwrap();
    assert!(rows
        .iter()
        .any(|row| row["Metric"] == "Hallucination" && row["Status"] == "Pass"));
}

#[tokio::test]
async fn predict_reports_blank_question_with_200() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(&dir, Arc::default());

    let response = app
        .oneshot(post_json("/api/predict", json!({"question": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["answer"], "Please enter a policy question.");
    assert!(body["decision"].is_null());
}

#[tokio::test]
async fn evaluate_maps_errors_to_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(&dir, Arc::default());

    let response = app
        .oneshot(post_json("/api/evaluate", json!({"question": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn evaluate_includes_contexts() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(&dir, Arc::default());

    let response = app
        .oneshot(post_json(
            "/api/evaluate",
            json!({
                "question": "What is the internet speed requirement?",
                "ground_truth": "A minimum of 50 Mbps."
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["contexts"][0]["content"], common::SPEED_PASSAGE);
    assert_eq!(body["report"]["ground_truth_supplied"], true);
}

#[tokio::test]
async fn admin_endpoints_require_session_token() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(RecordingAudit::default());
    let (app, _) = app(&dir, audit.clone());

    let config = app
        .clone()
        .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(config.status(), StatusCode::UNAUTHORIZED);

    let audit_response = app
        .oneshot(
            Request::post("/api/audit")
                .header(API_KEY_HEADER, "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(audit_response.status(), StatusCode::UNAUTHORIZED);
    assert!(audit.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn config_is_redacted_and_patchable() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = app(&dir, Arc::default());

    let response = app
        .clone()
        .oneshot(
            Request::patch("/api/config")
                .header(API_KEY_HEADER, TOKEN)
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"llm": {"api_key": "sk-live", "model": "gpt-4o"}}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["restart_required"], true);

    let response = app
        .oneshot(
            Request::get("/api/config")
                .header(API_KEY_HEADER, TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["llm"]["model"], "gpt-4o");
    assert_eq!(body["llm"]["api_key"], "****");

    let stored = state.config.load_config().unwrap();
    assert_eq!(stored["llm"]["api_key"], "sk-live");
}

#[tokio::test]
async fn audit_runs_configured_suite() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(RecordingAudit::default());
    let (app, _) = app(&dir, audit.clone());

    let response = app
        .oneshot(
            Request::post("/api/audit")
                .header(API_KEY_HEADER, TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "pass");
    assert_eq!(body["output"], "8 of 8 cases passed");
    assert!(body["finished_at"].is_string());

    let seen = audit.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, dir.path().join("config/audit_suite.yml"));
}

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use peervisor::server::{AppState, router};
use peervisor::{Config, Orchestrator};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app() -> (Router, Arc<Orchestrator>) {
    let orch = Orchestrator::builder(Config::default()).build();
    let app = router(AppState::new(Arc::clone(&orch), CancellationToken::new()));
    (app, orch)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn connect_runs_the_handshake() {
    let (app, orch) = app();
    let mut live = orch.subscribe();

    let (status, body) = call(&app, "POST", "/connect", Some(json!({"node_id": "03"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["node_id"], "03");
    assert_eq!(body["steps_completed"], 7);
    assert!(body["sequence_id"].as_str().unwrap().starts_with("seq_03_"));

    let mut count = 0;
    while live.try_recv().is_some() {
        count += 1;
    }
    assert_eq!(count, 8);
}

#[tokio::test]
async fn connect_without_body_uses_default_peer() {
    let (app, _orch) = app();
    let (status, body) = call(&app, "POST", "/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["node_id"], "03");
}

#[tokio::test]
async fn rawmsg_ping_returns_pong_exchange() {
    let (app, _orch) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/rawmsg",
        Some(json!({"type": "ping", "content": {"num_pong_bytes": 16, "byteslen": 16}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message_type"], "ping");
    assert_eq!(body["kind"], "correlated");
    assert_eq!(body["matched"], true);
    assert_eq!(body["timed_out"], false);
    assert_eq!(body["content"]["ignored"], "00".repeat(16));

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["direction"], "in");
    assert_eq!(messages[1]["msg_name"], "pong");
}

#[tokio::test]
async fn raw_msg_alias_passes_unknown_types_through() {
    let (app, orch) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/raw-msg",
        Some(json!({"msg": "banana", "content": {"color": "yellow"}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "passthrough");
    assert_eq!(body["content"], json!({"color": "yellow"}));
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert!(!orch.gateway().is_running(), "runner untouched by passthrough");
}

#[tokio::test]
async fn rawmsg_validation_errors() {
    let (app, _orch) = app();

    let (status, body) = call(&app, "POST", "/rawmsg", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = call(&app, "POST", "/rawmsg", Some(json!({"content": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message type is required");

    let (status, _) = call(&app, "POST", "/rawmsg", Some(json!({"type": "ping", "content": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn torn_down_runner_is_unavailable() {
    let (app, orch) = app();
    orch.gateway().teardown().await.unwrap();

    let (status, body) = call(&app, "POST", "/connect", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "not_running");

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runner_running"], false);
}

#[tokio::test]
async fn runner_failure_is_a_server_error() {
    let orch = Orchestrator::builder(Config::default())
        .with_runner_factory(|| {
            Box::new(peervisor::DummyRunner::default().rejecting("shutdown"))
                as Box<dyn peervisor::PeerRunner>
        })
        .build();
    let app = router(AppState::new(orch, CancellationToken::new()));

    let (status, body) = call(&app, "POST", "/rawmsg", Some(json!({"type": "shutdown"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "runner_error");
}

#[tokio::test]
async fn oversized_ping_payload_is_rejected_without_crashing() {
    let (app, _orch) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/rawmsg",
        Some(json!({"type": "ping", "content": {"byteslen": u64::MAX}})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "runner_error");

    let (status, body) = call(&app, "POST", "/rawmsg", Some(json!({"type": "ping"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
}

#[tokio::test]
async fn node_info_reports_features() {
    let (app, _orch) = app();
    let (status, body) = call(&app, "GET", "/node-info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runner_state"], "uninitialized");
    assert_eq!(body["local_features"], "82");
    assert_eq!(body["extended_global_features"], peervisor::encode_features([99]));
}

#[tokio::test]
async fn messages_returns_recent_events() {
    let (app, _orch) = app();
    let (_, connect) = call(&app, "POST", "/connect", None).await;
    let sequence_id = connect["sequence_id"].as_str().unwrap().to_string();

    let uri = format!("/messages?sequence_id={sequence_id}");
    let mut body = Value::Null;
    for _ in 0..100 {
        body = call(&app, "GET", &uri, None).await.1;
        if body["count"] == 8 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(body["count"], 8);
    assert_eq!(body["events"][7]["event"], "sequence_complete");

    let (_, limited) = call(&app, "GET", "/messages?limit=2", None).await;
    assert_eq!(limited["count"], 2);
}

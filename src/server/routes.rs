//! Request handlers.
//!
//! Handlers are thin: they validate the JSON body, call the [`Orchestrator`](crate::Orchestrator)
//! and shape its result into a response. Bodies are parsed from raw bytes so an
//! empty body falls back to the request's defaults while malformed JSON is a
//! validation error.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use crate::runner::{Fields, PeerIdentity};

use super::AppState;
use super::error::ApiError;

/// Default number of events returned by `GET /messages`.
const DEFAULT_MESSAGES_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConnectRequest {
    node_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMsgRequest {
    #[serde(rename = "type", alias = "msg")]
    msg_type: Option<String>,
    content: Option<Value>,
    node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesQuery {
    limit: Option<usize>,
    sequence_id: Option<String>,
}

/// Parses `body` as JSON; an empty body yields `None`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::validation(format!("invalid JSON body: {e}")))
}

fn peer_from(node_id: Option<String>) -> Result<Option<PeerIdentity>, ApiError> {
    match node_id {
        None => Ok(None),
        Some(id) if id.trim().is_empty() => Err(ApiError::validation("node_id must not be empty")),
        Some(id) => Ok(Some(PeerIdentity::new(id))),
    }
}

/// `POST /connect`: runs the handshake sequence.
pub(crate) async fn connect(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: ConnectRequest = parse_body(&body)?.unwrap_or_default();
    let node_id = peer_from(req.node_id)?;

    let summary = state.orch.run_handshake(node_id.clone()).await?;
    let node_id = node_id.unwrap_or_else(|| state.orch.config().primary_peer.clone());
    info!(sequence_id = %summary.sequence_id, %node_id, "handshake request served");

    let status = if summary.is_clean() { "success" } else { "partial" };
    Ok(Json(json!({
        "status": status,
        "sequence_id": summary.sequence_id,
        "node_id": node_id,
        "steps_completed": summary.steps_completed,
        "total_steps": summary.total_steps,
        "failed_steps": summary.failed_steps,
    })))
}

/// `POST /rawmsg` and `POST /raw-msg`: sends one ad-hoc message.
pub(crate) async fn raw_msg(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: RawMsgRequest =
        parse_body(&body)?.ok_or_else(|| ApiError::validation("No JSON data provided"))?;

    let msg_type = match req.msg_type {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::validation("Message type is required")),
    };
    let fields: Fields = match req.content {
        None | Some(Value::Null) => Fields::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ApiError::validation("content must be a JSON object")),
    };
    let peer = peer_from(req.node_id)?;

    let exchange = state.orch.run_single(peer.as_ref(), &msg_type, fields).await?;

    let status = if exchange.timed_out { "timeout" } else { "success" };
    Ok(Json(json!({
        "status": status,
        "message_type": exchange.request_type,
        "content": exchange.request_fields,
        "kind": exchange.kind,
        "expected_response": exchange.expected_response_type,
        "matched": exchange.matched,
        "timed_out": exchange.timed_out,
        "elapsed_ms": exchange.elapsed_ms,
        "messages": exchange.messages(),
    })))
}

/// `GET /health`: liveness plus runner status.
pub(crate) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "runner_running": state.orch.gateway().is_running(),
        "subscribers": state.orch.bus().subscriber_count(),
    }))
}

/// `GET /node-info`: runner lifecycle and advertised features.
pub(crate) async fn node_info(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.orch.gateway();
    let extra = &state.orch.config().additional_feature_bits;
    let global = gateway.features(true, &[]).await;
    let extended = gateway.features(true, extra).await;
    let local = gateway.features(false, &[]).await;

    Json(json!({
        "runner_state": gateway.state(),
        "running": gateway.is_running(),
        "global_features": global,
        "extended_global_features": extended,
        "local_features": local,
        "peer": state.orch.config().primary_peer,
    }))
}

/// `GET /messages?limit=N[&sequence_id=ID]`: most recent events, oldest first.
pub(crate) async fn messages(
    State(state): State<AppState>,
    Query(q): Query<MessagesQuery>,
) -> impl IntoResponse {
    let limit = q.limit.unwrap_or(DEFAULT_MESSAGES_LIMIT);
    let recorded = match (state.orch.history(), q.sequence_id) {
        (Some(history), Some(id)) => history.sequence(&id).await,
        (Some(history), None) => history.snapshot(limit).await,
        (None, _) => Vec::new(),
    };
    let events: Vec<Value> = recorded.iter().map(|ev| ev.to_json()).collect();
    Json(json!({
        "count": events.len(),
        "events": events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_empty_and_malformed() {
        let empty: Option<ConnectRequest> = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(empty.is_none());

        let bad = parse_body::<ConnectRequest>(&Bytes::from_static(b"{nope"));
        assert_eq!(bad.unwrap_err().as_label(), "validation_error");
    }

    #[test]
    fn test_raw_msg_accepts_msg_alias() {
        let req: RawMsgRequest =
            parse_body(&Bytes::from_static(br#"{"msg":"ping","content":{}}"#))
                .unwrap()
                .unwrap();
        assert_eq!(req.msg_type.as_deref(), Some("ping"));
    }
}

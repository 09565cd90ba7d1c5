//! Live event stream over WebSocket.
//!
//! Each client gets its own bus [`Subscription`](crate::Subscription) and a
//! forwarding task:
//!
//! ```text
//! Bus ──► [client receiver] ──► forward() ──► Message::Text(event JSON) ──► client
//!                                  ▲
//!          client frames ──────────┘ (close ends the stream, everything else is ignored)
//! ```
//!
//! A client that cannot keep up loses its oldest pending events; the protocol
//! path and other clients are never slowed down.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use super::AppState;

static NEXT_CLIENT: AtomicU64 = AtomicU64::new(1);

/// `GET /ws`: upgrades to a WebSocket and starts forwarding events.
pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| forward(socket, state))
}

async fn forward(socket: WebSocket, state: AppState) {
    let mut sub = state.orch.subscribe();
    let client = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
    let (mut tx, mut rx) = socket.split();
    info!(client, "websocket client connected");

    let welcome = json!({ "event": "connected", "status": "connected" });
    if tx.send(Message::Text(welcome.to_string())).await.is_err() {
        debug!(client, "client left before welcome");
        return;
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = tx.send(Message::Close(None)).await;
                break;
            }
            ev = sub.recv() => match ev {
                Some(ev) => {
                    if let Err(e) = tx.send(Message::Text(ev.to_json().to_string())).await {
                        debug!(client, error = %e, "send failed, dropping client");
                        break;
                    }
                }
                None => {
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = rx.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(client, error = %e, "websocket error");
                    break;
                }
            },
        }
    }

    let dropped = sub.dropped();
    if dropped > 0 {
        warn!(client, dropped, "client fell behind; oldest events were dropped");
    }
    info!(client, "websocket client disconnected");
}

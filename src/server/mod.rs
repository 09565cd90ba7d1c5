//! # HTTP and WebSocket surface.
//!
//! Thin glue between the network and the [`Orchestrator`]:
//!
//! | route              | method | handler                       |
//! |--------------------|--------|-------------------------------|
//! | `/connect`         | POST   | run the handshake sequence    |
//! | `/rawmsg`, `/raw-msg` | POST | send one ad-hoc message      |
//! | `/health`          | GET    | liveness and runner status    |
//! | `/node-info`       | GET    | runner state and features     |
//! | `/messages`        | GET    | recent events                 |
//! | `/ws`              | GET    | live event stream (WebSocket) |
//!
//! Every route is wrapped in `TraceLayer` (request spans) and a permissive
//! `CorsLayer`.

mod error;
mod routes;
mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::{Orchestrator, shutdown_signal};

pub use error::ApiError;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) orch: Arc<Orchestrator>,
    pub(crate) shutdown: CancellationToken,
}

impl AppState {
    /// Creates handler state; cancelling `shutdown` closes every WebSocket stream.
    pub fn new(orch: Arc<Orchestrator>, shutdown: CancellationToken) -> Self {
        Self { orch, shutdown }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/connect", post(routes::connect))
        .route("/rawmsg", post(routes::raw_msg))
        .route("/raw-msg", post(routes::raw_msg))
        .route("/health", get(routes::health))
        .route("/node-info", get(routes::node_info))
        .route("/messages", get(routes::messages))
        .route("/ws", get(websocket::upgrade))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serves the router on `addr` until a termination signal arrives or `shutdown`
/// is cancelled, then shuts the orchestrator down.
pub async fn serve(
    orch: Arc<Orchestrator>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let app = router(AppState::new(Arc::clone(&orch), shutdown.clone()));
    let res = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await;

    orch.shutdown().await;
    res
}

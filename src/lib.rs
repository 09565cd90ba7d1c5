//! # peervisor
//!
//! **Peervisor** drives scripted or ad-hoc peer-protocol handshakes against a single
//! shared, stateful peer runner and streams every action as a structured event to
//! any number of live observers.
//!
//! It guarantees three things:
//! - concurrent callers never interleave actions on the shared runner;
//! - a request is correlated with its expected response under a timeout;
//! - a slow or vanished observer never stalls protocol execution.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   POST /connect     POST /rawmsg               GET /ws (N clients)
//!        │                 │                           ▲
//!        ▼                 ▼                           │
//! ┌─────────────────────────────────────────┐          │
//! │ Orchestrator                            │          │
//! │  SequenceExecutor                       │          │
//! │   ├─ run_handshake (7 steps)            │          │
//! │   └─ run_single ─► ActionCorrelator     │          │
//! │                     └─ MessageClassifier│          │
//! └───────┬──────────────────┬──────────────┘          │
//!         │ acquire()        │ publish(Event)          │
//!         ▼                  ▼                         │
//! ┌────────────────┐  ┌──────────────────────────────────────────┐
//! │ RunnerGateway  │  │ Bus (broadcast ring; a lagging receiver  │
//! │  async mutex   │  │      skips its oldest events)            │
//! │  lifecycle     │  └──┬──────────────┬───────────────┬────────┘
//! └───────┬────────┘     ▼              ▼               ▼
//!         ▼           LogWriter    RecentEvents   WebSocket forwarder
//!   dyn PeerRunner   (worker)       (worker)        (per client)
//!   (DummyRunner)
//! ```
//!
//! ### Handshake
//! ```text
//! acquire ─► 1 Connect(a) ─► 2 Expect(init) ─► 3 Send(init) ─► 4 Disconnect
//!        ─► 5 Connect(b) ─► 6 Expect(init) ─► 7 Send(init, +feature bits)
//!        ─► release ─► sequence_complete
//! ```
//! One event per step (an `Error` event for a failed step, execution continues),
//! then exactly one `sequence_complete` event.
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Runner seam**   | Plug in a peer implementation.                                | [`PeerRunner`], [`DummyRunner`]             |
//! | **Exclusivity**   | Serialize access to the shared runner; own its lifecycle.     | [`RunnerGateway`], [`RunnerHandle`]         |
//! | **Correlation**   | Pair requests with expected responses under a timeout.        | [`ActionCorrelator`], [`MessageClassifier`] |
//! | **Sequencing**    | Run the handshake script or one exchange, publishing events.  | [`SequenceExecutor`], [`Sequence`]          |
//! | **Events**        | Non-blocking fan-out to live observers.                       | [`Bus`], [`Event`], [`Subscribe`]           |
//! | **Errors**        | Typed errors with stable labels.                              | [`GatewayError`], [`PeerError`]             |
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use peervisor::{Config, EventKind, Fields, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let orch = Orchestrator::builder(Config::default()).build();
//!     let mut live = orch.subscribe();
//!
//!     let exchange = orch.run_single(None, "ping", Fields::new()).await.unwrap();
//!     assert!(exchange.matched);
//!     assert_eq!(exchange.response_type.as_deref(), Some("pong"));
//!
//!     let first = live.recv().await.unwrap();
//!     assert_eq!(first.kind, EventKind::Msg);
//!
//!     orch.shutdown().await;
//! }
//! ```

mod actions;
mod core;
mod error;
mod events;
mod runner;
mod subscribers;

pub mod server;

// ---- Public re-exports ----

pub use actions::{
    Action, Exchange, ExchangeKind, Sequence, SequenceSummary, StepFailure, next_sequence_id,
};
pub use crate::core::{
    ActionCorrelator, Classification, Config, DEFAULT_EXPECT_TIMEOUT, MessageClassifier,
    Orchestrator, OrchestratorBuilder, RunnerFactory, RunnerGateway, RunnerHandle, RunnerState,
    SequenceExecutor, shutdown_signal,
};
pub use error::{GatewayError, PeerError};
pub use events::{Bus, Direction, Event, EventKind, Subscription};
pub use runner::{DummyRunner, DummyRunnerConfig, Fields, PeerIdentity, PeerRunner, encode_features};
pub use subscribers::{LogWriter, RecentEvents, Subscribe, SubscriberSet};

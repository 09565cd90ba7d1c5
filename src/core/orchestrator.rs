//! # Orchestrator: wires the gateway, executor, bus and subscribers together.
//!
//! The [`Orchestrator`] is the single object the HTTP layer talks to. It owns the
//! event [`Bus`], the [`SubscriberSet`] driving in-process subscribers, the shared
//! [`RunnerGateway`] and the [`SequenceExecutor`].
//!
//! ## High-level architecture
//! ```text
//! HTTP handler ──► Orchestrator::run_handshake / run_single
//!                        │
//!                        ▼
//!                 SequenceExecutor ──► ActionCorrelator ──► RunnerGateway ──► PeerRunner
//!                        │
//!                 publish(Event)
//!                        ▼
//!                       Bus ─┬─► worker ─► LogWriter
//!                            ├─► worker ─► RecentEvents
//!                            └─► Subscription per WebSocket client
//!
//! Shutdown path:
//!   Orchestrator::shutdown()
//!        ├─► RunnerGateway::teardown()
//!        ├─► SubscriberSet::shutdown()   (drain + join workers)
//!        └─► Bus::close()                (ends every remaining Subscription)
//! ```
//!
//! ## Example
//! ```rust
//! use peervisor::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let orch = Orchestrator::builder(Config::default()).build();
//!
//!     let summary = orch.run_handshake(None).await.unwrap();
//!     assert_eq!(summary.total_steps, 7);
//!     assert!(summary.is_clean());
//!
//!     orch.shutdown().await;
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::actions::{Exchange, SequenceSummary};
use crate::error::GatewayError;
use crate::events::{Bus, Subscription};
use crate::runner::{Fields, PeerIdentity};
use crate::subscribers::{RecentEvents, SubscriberSet};

use super::builder::OrchestratorBuilder;
use super::config::Config;
use super::executor::SequenceExecutor;
use super::gateway::RunnerGateway;

/// Owns the runtime components and exposes the request-level operations.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    gateway: Arc<RunnerGateway>,
    executor: SequenceExecutor,
    history: Option<Arc<RecentEvents>>,
    subs: Mutex<Option<SubscriberSet>>,
    subscriber_names: Vec<&'static str>,
}

impl Orchestrator {
    /// Returns a builder for configuring the orchestrator.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        gateway: Arc<RunnerGateway>,
        executor: SequenceExecutor,
        history: Option<Arc<RecentEvents>>,
        subs: SubscriberSet,
    ) -> Self {
        let subscriber_names = subs.names();
        Self {
            cfg,
            bus,
            gateway,
            executor,
            history,
            subs: Mutex::new(Some(subs)),
            subscriber_names,
        }
    }

    /// Runs the connect/init handshake.
    ///
    /// `node_id` overrides the first counterparty; the second one and the extra
    /// feature bits come from the configuration.
    pub async fn run_handshake(
        &self,
        node_id: Option<PeerIdentity>,
    ) -> Result<SequenceSummary, GatewayError> {
        let peer_a = node_id.unwrap_or_else(|| self.cfg.primary_peer.clone());
        self.executor
            .run_handshake(
                peer_a,
                self.cfg.secondary_peer.clone(),
                &self.cfg.additional_feature_bits,
            )
            .await
    }

    /// Sends one ad-hoc message and awaits its correlated response, if any.
    pub async fn run_single(
        &self,
        peer: Option<&PeerIdentity>,
        msg_type: &str,
        fields: Fields,
    ) -> Result<Exchange, GatewayError> {
        self.executor.run_single(peer, msg_type, fields).await
    }

    /// Opens a new live subscription on the event bus.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Returns the event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Returns the shared runner gateway.
    pub fn gateway(&self) -> &Arc<RunnerGateway> {
        &self.gateway
    }

    /// Returns the recent-events ring, if enabled.
    pub fn history(&self) -> Option<&Arc<RecentEvents>> {
        self.history.as_ref()
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Names of the in-process subscribers.
    pub fn subscriber_names(&self) -> &[&'static str] {
        &self.subscriber_names
    }

    /// Tears down the runner, drains subscriber workers and closes the bus.
    ///
    /// Safe to call more than once; later calls only re-close the bus.
    pub async fn shutdown(&self) {
        if let Err(e) = self.gateway.teardown().await {
            warn!(error = %e, "runner teardown failed during shutdown");
        }
        let subs = self.subs.lock().take();
        if let Some(subs) = subs {
            subs.shutdown().await;
        }
        self.bus.close();
        info!("orchestrator stopped");
    }
}

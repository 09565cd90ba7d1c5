//! # Runner gateway: exclusive access to the shared peer runner.
//!
//! The [`RunnerGateway`] owns the process-wide runner and its lifecycle. Request
//! handlers never touch the runner directly: they [`acquire`](RunnerGateway::acquire)
//! a [`RunnerHandle`], perform one logical action through it, and drop it.
//!
//! ## Lifecycle
//! ```text
//! uninitialized ──start()──► started ──stop()──► stopped ──start()──► started
//!       │                       │                   │
//!       └──────────────── teardown() ───────────────┴──► torn down (irreversible)
//!                                                             │
//!                                  reinitialize() ◄───────────┘ (fresh runner, uninitialized)
//! ```
//!
//! ## Rules
//! - **Mutual exclusion**: at most one handle exists at a time; waiters queue FIFO.
//! - **Guaranteed release**: the handle owns the lock guard, so the lock is released
//!   on every exit path (success, error, panic, cancellation).
//! - **Lazy start**: acquiring an `uninitialized` runner starts it first.
//! - **NotRunning**: acquiring a `stopped` or `torn down` runner fails.
//! - **Error tagging**: runner failures become [`GatewayError::Runner`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as StateMirror;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::runner::{Fields, PeerIdentity, PeerRunner};

/// Builds a fresh runner (used at construction and by [`RunnerGateway::reinitialize`]).
pub type RunnerFactory = Arc<dyn Fn() -> Box<dyn PeerRunner> + Send + Sync>;

/// Lifecycle state of the shared runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    /// Created, never started.
    Uninitialized,
    /// Accepting actions.
    Started,
    /// Stopped; may be started again.
    Stopped,
    /// Resources released; only [`RunnerGateway::reinitialize`] brings it back.
    TornDown,
}

/// The runner together with its lifecycle state (guarded as one unit).
struct Slot {
    runner: Box<dyn PeerRunner>,
    state: RunnerState,
}

/// Single-owner wrapper around the shared peer runner.
pub struct RunnerGateway {
    slot: Arc<Mutex<Slot>>,
    /// Lock-free view of `Slot::state` for status reads that must not queue behind actions.
    state: Arc<StateMirror<RunnerState>>,
    factory: RunnerFactory,
}

impl RunnerGateway {
    /// Creates a gateway around a runner built by `factory`; the runner starts
    /// `uninitialized`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn PeerRunner> + Send + Sync + 'static,
    {
        let factory: RunnerFactory = Arc::new(factory);
        let runner = factory();
        Self {
            slot: Arc::new(Mutex::new(Slot {
                runner,
                state: RunnerState::Uninitialized,
            })),
            state: Arc::new(StateMirror::new(RunnerState::Uninitialized)),
            factory,
        }
    }

    /// Grants exclusive access to the runner until the returned handle is dropped.
    ///
    /// Suspends while another caller holds the handle.
    pub async fn acquire(&self) -> Result<RunnerHandle, GatewayError> {
        let waited = Instant::now();
        let mut guard = Arc::clone(&self.slot).lock_owned().await;

        match guard.state {
            RunnerState::Started => {}
            RunnerState::Uninitialized => {
                guard.runner.start().await?;
                self.set_state(&mut guard, RunnerState::Started);
                info!(runner = guard.runner.name(), "runner started on first use");
            }
            RunnerState::Stopped | RunnerState::TornDown => {
                return Err(GatewayError::NotRunning);
            }
        }

        debug!(waited_ms = waited.elapsed().as_millis() as u64, "runner handle acquired");
        Ok(RunnerHandle { guard })
    }

    /// Explicitly returns a handle. Equivalent to dropping it.
    pub fn release(&self, handle: RunnerHandle) {
        drop(handle);
    }

    /// Starts the runner. Idempotent: starting a started runner is a no-op.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let mut guard = self.slot.lock().await;
        match guard.state {
            RunnerState::Started => Ok(()),
            RunnerState::TornDown => Err(GatewayError::NotRunning),
            RunnerState::Uninitialized | RunnerState::Stopped => {
                guard.runner.start().await?;
                self.set_state(&mut guard, RunnerState::Started);
                info!(runner = guard.runner.name(), "runner started");
                Ok(())
            }
        }
    }

    /// Stops a started runner. No-op in any other state.
    pub async fn stop(&self) -> Result<(), GatewayError> {
        let mut guard = self.slot.lock().await;
        if guard.state != RunnerState::Started {
            return Ok(());
        }
        let res = guard.runner.stop().await;
        self.set_state(&mut guard, RunnerState::Stopped);
        info!(runner = guard.runner.name(), "runner stopped");
        res.map_err(GatewayError::from)
    }

    /// Releases every runner resource. Irreversible: later `acquire()`/`start()`
    /// fail with [`GatewayError::NotRunning`] until [`reinitialize`](Self::reinitialize).
    ///
    /// The runner is marked torn down even if its own teardown fails.
    pub async fn teardown(&self) -> Result<(), GatewayError> {
        let mut guard = self.slot.lock().await;
        if guard.state == RunnerState::TornDown {
            return Ok(());
        }
        let res = guard.runner.teardown().await;
        self.set_state(&mut guard, RunnerState::TornDown);
        info!(runner = guard.runner.name(), "runner torn down");
        res.map_err(GatewayError::from)
    }

    /// Replaces the runner with a fresh instance from the factory and resets the
    /// lifecycle to `uninitialized`. A live runner is torn down first.
    pub async fn reinitialize(&self) {
        let mut guard = self.slot.lock().await;
        if matches!(guard.state, RunnerState::Started | RunnerState::Stopped) {
            if let Err(e) = guard.runner.teardown().await {
                warn!(error = %e, "teardown before reinitialize failed");
            }
        }
        guard.runner = (self.factory)();
        self.set_state(&mut guard, RunnerState::Uninitialized);
        info!(runner = guard.runner.name(), "runner reinitialized");
    }

    /// Current lifecycle state (does not wait for in-flight actions).
    pub fn state(&self) -> RunnerState {
        *self.state.lock()
    }

    /// True while the runner is started.
    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Started
    }

    /// Returns the runner's feature bitfield (waits for exclusive access).
    pub async fn features(&self, global: bool, additional: &[u32]) -> String {
        self.slot.lock().await.runner.features(global, additional)
    }

    fn set_state(&self, slot: &mut Slot, state: RunnerState) {
        slot.state = state;
        *self.state.lock() = state;
    }
}

/// Exclusive access to the runner for the duration of one logical action.
///
/// Dropping the handle releases the gateway.
pub struct RunnerHandle {
    guard: OwnedMutexGuard<Slot>,
}

impl RunnerHandle {
    /// Opens a connection to `peer` (no-op if already connected to it).
    pub async fn connect(&mut self, peer: &PeerIdentity) -> Result<(), GatewayError> {
        Ok(self.guard.runner.connect(peer).await?)
    }

    /// Closes the current connection.
    pub async fn disconnect(&mut self) -> Result<(), GatewayError> {
        Ok(self.guard.runner.disconnect().await?)
    }

    /// Sends one message; returns the fields actually transmitted.
    pub async fn send(&mut self, msg_type: &str, fields: Fields) -> Result<Fields, GatewayError> {
        Ok(self.guard.runner.send(msg_type, fields).await?)
    }

    /// Waits up to `timeout` for a message of `msg_type`.
    ///
    /// Returns `Ok(None)` on timeout: a missing response is a reportable outcome,
    /// not a failure.
    pub async fn expect(
        &mut self,
        msg_type: &str,
        timeout: Duration,
    ) -> Result<Option<Fields>, GatewayError> {
        match time::timeout(timeout, self.guard.runner.expect(msg_type)).await {
            Ok(res) => Ok(Some(res?)),
            Err(_elapsed) => {
                debug!(msg_type, timeout_ms = timeout.as_millis() as u64, "expect timed out");
                Ok(None)
            }
        }
    }

    /// Returns the runner's feature bitfield.
    pub fn features(&self, global: bool, additional: &[u32]) -> String {
        self.guard.runner.features(global, additional)
    }

    /// Currently connected peer, if any.
    pub fn connected_peer(&self) -> Option<PeerIdentity> {
        self.guard.runner.connected_peer().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::DummyRunner;

    fn gateway() -> RunnerGateway {
        RunnerGateway::new(|| Box::new(DummyRunner::default()) as Box<dyn PeerRunner>)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let gw = gateway();
        gw.start().await.unwrap();
        gw.start().await.unwrap();
        assert_eq!(gw.state(), RunnerState::Started);
        assert!(gw.is_running());
    }

    #[tokio::test]
    async fn test_acquire_starts_lazily() {
        let gw = gateway();
        assert_eq!(gw.state(), RunnerState::Uninitialized);
        let handle = gw.acquire().await.unwrap();
        assert_eq!(gw.state(), RunnerState::Started);
        gw.release(handle);
    }

    #[tokio::test]
    async fn test_acquire_after_stop_or_teardown_fails() {
        let gw = gateway();
        gw.start().await.unwrap();
        gw.stop().await.unwrap();
        assert_eq!(gw.acquire().await.err(), Some(GatewayError::NotRunning));

        gw.teardown().await.unwrap();
        assert_eq!(gw.state(), RunnerState::TornDown);
        assert_eq!(gw.acquire().await.err(), Some(GatewayError::NotRunning));
        assert_eq!(gw.start().await, Err(GatewayError::NotRunning));
    }

    #[tokio::test]
    async fn test_reinitialize_recovers_after_teardown() {
        let gw = gateway();
        gw.teardown().await.unwrap();
        gw.reinitialize().await;
        assert_eq!(gw.state(), RunnerState::Uninitialized);
        assert!(gw.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_runner_error_releases_lock() {
        let gw = gateway();
        {
            let mut handle = gw.acquire().await.unwrap();
            let err = handle.send("ping", Fields::new()).await.unwrap_err();
            assert_eq!(err.as_label(), "runner_error");
        }
        let next = time::timeout(Duration::from_secs(1), gw.acquire()).await;
        assert!(matches!(next, Ok(Ok(_))), "lock must be free after an error");
    }

    #[tokio::test]
    async fn test_second_acquire_waits_for_release() {
        let gw = gateway();
        let handle = gw.acquire().await.unwrap();

        let blocked = time::timeout(Duration::from_millis(20), gw.acquire()).await;
        assert!(blocked.is_err());

        drop(handle);
        assert!(gw.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_timeout_is_not_an_error() {
        let gw = gateway();
        let mut handle = gw.acquire().await.unwrap();
        handle.connect(&"03".into()).await.unwrap();

        let got = handle.expect("pong", Duration::from_millis(50)).await.unwrap();
        assert!(got.is_none());
        assert_eq!(handle.connected_peer().map(|p| p.to_string()), Some("03".into()));
    }

    #[tokio::test]
    async fn test_features_through_gateway() {
        let gw = gateway();
        assert_eq!(gw.features(false, &[]).await, "82");
    }
}

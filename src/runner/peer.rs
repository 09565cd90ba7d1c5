//! # Peer runner abstraction.
//!
//! This module defines the [`PeerRunner`] trait: the seam between the orchestrator
//! and the stateful component that simulates one side of a two-party protocol
//! connection. The orchestrator never touches a runner directly: it is owned by the
//! [`RunnerGateway`](crate::RunnerGateway), which serializes every call.
//!
//! A runner:
//! - opens and closes a simulated connection to a [`PeerIdentity`];
//! - sends typed protocol messages and reports the fields it actually transmitted;
//! - waits for a typed inbound message (the gateway bounds the wait with a timeout);
//! - reports its supported feature bits.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PeerError;

/// Message fields: a JSON object keyed by field name.
pub type Fields = Map<String, Value>;

/// Opaque key selecting which simulated counterparty a connect targets (e.g. `"03"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Wraps a peer key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the peer key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for PeerIdentity {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// # Stateful simulated protocol peer.
///
/// Every method takes `&mut self`: the gateway guarantees exclusive access, so
/// implementations need no internal synchronization.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use peervisor::{Fields, PeerError, PeerIdentity, PeerRunner};
///
/// struct Silent { running: bool }
///
/// #[async_trait]
/// impl PeerRunner for Silent {
///     async fn start(&mut self) -> Result<(), PeerError> { self.running = true; Ok(()) }
///     async fn stop(&mut self) -> Result<(), PeerError> { self.running = false; Ok(()) }
///     async fn teardown(&mut self) -> Result<(), PeerError> { self.running = false; Ok(()) }
///     fn is_running(&self) -> bool { self.running }
///     async fn connect(&mut self, _peer: &PeerIdentity) -> Result<(), PeerError> { Ok(()) }
///     async fn disconnect(&mut self) -> Result<(), PeerError> { Ok(()) }
///     async fn send(&mut self, _t: &str, fields: Fields) -> Result<Fields, PeerError> { Ok(fields) }
///     async fn expect(&mut self, _t: &str) -> Result<Fields, PeerError> {
///         std::future::pending().await
///     }
///     fn features(&self, _global: bool, _additional: &[u32]) -> String { String::new() }
///     fn connected_peer(&self) -> Option<&PeerIdentity> { None }
/// }
/// ```
#[async_trait]
pub trait PeerRunner: Send + 'static {
    /// Returns a stable, human-readable runner name (used in logs).
    fn name(&self) -> &str {
        "peer-runner"
    }

    /// Brings the runner up.
    async fn start(&mut self) -> Result<(), PeerError>;

    /// Stops the runner; it may be started again.
    async fn stop(&mut self) -> Result<(), PeerError>;

    /// Releases every resource held by the runner.
    async fn teardown(&mut self) -> Result<(), PeerError>;

    /// Returns `true` while the runner is started.
    fn is_running(&self) -> bool;

    /// Opens a simulated connection to `peer`.
    ///
    /// Connecting to the peer that is already connected must be a no-op.
    async fn connect(&mut self, peer: &PeerIdentity) -> Result<(), PeerError>;

    /// Closes the current connection (no-op without one).
    async fn disconnect(&mut self) -> Result<(), PeerError>;

    /// Sends one message and returns the fields that were actually transmitted
    /// (the runner may augment or normalize the input).
    async fn send(&mut self, msg_type: &str, fields: Fields) -> Result<Fields, PeerError>;

    /// Waits for the next inbound message of `msg_type` and returns its fields.
    ///
    /// May wait forever; the caller bounds the wait.
    async fn expect(&mut self, msg_type: &str) -> Result<Fields, PeerError>;

    /// Returns the runner's feature bitfield (hex), optionally with extra bits set.
    fn features(&self, global: bool, additional: &[u32]) -> String;

    /// Returns the currently connected peer, if any.
    fn connected_peer(&self) -> Option<&PeerIdentity>;
}

//! Error types used by the orchestrator and the peer runner seam.
//!
//! This module defines two enums:
//!
//! - [`PeerError`]: failures raised by a [`PeerRunner`](crate::PeerRunner) implementation.
//! - [`GatewayError`]: failures surfaced by the runner gateway to its callers.
//!
//! Timeouts while waiting for an expected response are **not** errors: they are
//! recorded in the [`Exchange`](crate::Exchange) and reported as a partial result.
//!
//! Both types provide `as_label` for logs and HTTP error kinds.

use thiserror::Error;

/// # Errors produced by a peer runner.
///
/// The runner is an external collaborator; its failures are opaque to the core and
/// carry only a message. The gateway converts them into [`GatewayError::Runner`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// An operation that needs a live connection was attempted without one.
    #[error("not connected to a peer")]
    NotConnected,

    /// The runner refused or failed the operation.
    #[error("{message}")]
    Failed {
        /// The underlying error message.
        message: String,
    },
}

impl PeerError {
    /// Shorthand for [`PeerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        PeerError::Failed {
            message: message.into(),
        }
    }
}

/// # Errors produced by the runner gateway.
///
/// - `NotRunning` is fatal to the request that hit it but does not affect other requests
///   once the runner is reinitialized.
/// - `Runner` wraps any failure raised by the runner itself. The gateway lock is always
///   released before this reaches the caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The runner was stopped or torn down.
    #[error("peer runner is not running")]
    NotRunning,

    /// The underlying runner operation failed.
    #[error("runner error: {message}")]
    Runner {
        /// The underlying error message.
        message: String,
    },
}

impl GatewayError {
    /// Returns a short stable label (snake_case) for use in logs and error bodies.
    ///
    /// # Example
    /// ```
    /// use peervisor::GatewayError;
    ///
    /// assert_eq!(GatewayError::NotRunning.as_label(), "not_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GatewayError::NotRunning => "not_running",
            GatewayError::Runner { .. } => "runner_error",
        }
    }
}

impl From<PeerError> for GatewayError {
    fn from(err: PeerError) -> Self {
        GatewayError::Runner {
            message: err.to_string(),
        }
    }
}

//! # Action correlator: send a message and await its response.
//!
//! ```text
//! classify(type) ── unknown ──► passthrough exchange (runner untouched)
//!       │
//!     known
//!       ▼
//! acquire ─► connect? ─► send ─► expect(response) ≤ timeout ─► release
//!                                      │
//!                                      └─ elapsed ─► timed_out = true
//! ```
//!
//! ## Rules
//! - The whole exchange runs under one gateway handle.
//! - A missing response is reported as `timed_out`, never as an error.
//! - Without an explicit peer, an existing connection is reused; otherwise the
//!   default peer is connected first.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::actions::{Exchange, ExchangeKind};
use crate::error::GatewayError;
use crate::runner::{Fields, PeerIdentity};

use super::classifier::MessageClassifier;
use super::gateway::{RunnerGateway, RunnerHandle};

/// Sends messages through the gateway and pairs them with their responses.
pub struct ActionCorrelator {
    gateway: Arc<RunnerGateway>,
    classifier: MessageClassifier,
    default_peer: PeerIdentity,
}

impl ActionCorrelator {
    /// Creates a correlator over `gateway`.
    pub fn new(
        gateway: Arc<RunnerGateway>,
        classifier: MessageClassifier,
        default_peer: PeerIdentity,
    ) -> Self {
        Self {
            gateway,
            classifier,
            default_peer,
        }
    }

    /// Message vocabulary in use.
    pub fn classifier(&self) -> &MessageClassifier {
        &self.classifier
    }

    /// Sends `msg_type` and, if the classifier maps it to a response, waits up to
    /// `timeout` for that response.
    ///
    /// Unknown message types are echoed as a passthrough exchange.
    pub async fn send_and_maybe_expect(
        &self,
        peer: Option<&PeerIdentity>,
        msg_type: &str,
        fields: Fields,
        timeout: Duration,
    ) -> Result<Exchange, GatewayError> {
        let class = self.classifier.classify(msg_type);
        if !class.known {
            debug!(msg_type, "unknown message type, passing through");
            return Ok(Exchange::passthrough(msg_type, fields));
        }

        let mut handle = self.gateway.acquire().await?;
        self.exchange_on(
            &mut handle,
            peer,
            msg_type,
            fields,
            class.expected_response,
            timeout,
        )
        .await
    }

    async fn exchange_on(
        &self,
        handle: &mut RunnerHandle,
        peer: Option<&PeerIdentity>,
        msg_type: &str,
        fields: Fields,
        expected: Option<String>,
        timeout: Duration,
    ) -> Result<Exchange, GatewayError> {
        match peer {
            Some(p) => handle.connect(p).await?,
            None if handle.connected_peer().is_none() => {
                handle.connect(&self.default_peer).await?
            }
            None => {}
        }

        let started = Instant::now();
        let sent = handle.send(msg_type, fields).await?;

        let mut exchange = Exchange {
            kind: ExchangeKind::Correlated,
            request_type: msg_type.to_string(),
            request_fields: sent,
            expected_response_type: expected.clone(),
            response_type: None,
            response_fields: None,
            matched: false,
            timed_out: false,
            elapsed_ms: 0,
        };

        if let Some(resp) = expected {
            match handle.expect(&resp, timeout).await? {
                Some(received) => {
                    exchange.response_type = Some(resp);
                    exchange.response_fields = Some(received);
                    exchange.matched = true;
                }
                None => {
                    warn!(msg_type, expected = %resp, timeout_ms = timeout.as_millis() as u64, "no response before timeout");
                    exchange.timed_out = true;
                }
            }
        }
        exchange.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(exchange)
    }
}

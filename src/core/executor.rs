//! # Sequence executor: runs action scripts and publishes their events.
//!
//! ```text
//! run_handshake(a, b, bits)
//!   ├─ acquire gateway (held for all 7 steps)
//!   ├─ for each step i in 1..=7:
//!   │     ok   → publish(kind, direction, payload, step = i)
//!   │     fail → publish(Error, step = i), record failure, continue
//!   ├─ release gateway
//!   └─ publish(sequence_complete, total_steps = 7)          ← exactly once, last
//!
//! run_single(peer?, type, fields)
//!   ├─ correlate (send + optional expect)
//!   ├─ publish(Msg out, request)  | publish(Error) on failure
//!   └─ publish(Msg in, response)  if one arrived
//! ```
//!
//! ## Rules
//! - A handshake starts from a clean connection: whatever an earlier request left
//!   connected is closed before step 1.
//! - Events of one sequence are published in step order, before the summary returns.
//! - A failed step never aborts the sequence; the summary lists it in `failed_steps`.
//! - Step payloads describe what actually happened (transmitted/received fields).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::actions::{
    Action, Exchange, Sequence, SequenceSummary, StepFailure, message_payload, next_sequence_id,
};
use crate::error::GatewayError;
use crate::events::{Bus, Direction, Event, EventKind};
use crate::runner::{Fields, PeerIdentity};

use super::correlator::ActionCorrelator;
use super::gateway::{RunnerGateway, RunnerHandle};

/// Why a single step failed.
enum StepError {
    Timeout { after_ms: u64 },
    Gateway(GatewayError),
}

impl StepError {
    fn as_label(&self) -> &'static str {
        match self {
            StepError::Timeout { .. } => "timeout",
            StepError::Gateway(e) => e.as_label(),
        }
    }

    fn message(&self) -> String {
        match self {
            StepError::Timeout { after_ms } => format!("no message after {after_ms}ms"),
            StepError::Gateway(e) => e.to_string(),
        }
    }
}

impl From<GatewayError> for StepError {
    fn from(e: GatewayError) -> Self {
        StepError::Gateway(e)
    }
}

/// Executes handshake sequences and single exchanges, publishing every step.
pub struct SequenceExecutor {
    gateway: Arc<RunnerGateway>,
    correlator: ActionCorrelator,
    bus: Bus,
    expect_timeout: Duration,
}

impl SequenceExecutor {
    /// Creates an executor publishing to `bus`.
    pub fn new(
        gateway: Arc<RunnerGateway>,
        correlator: ActionCorrelator,
        bus: Bus,
        expect_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            correlator,
            bus,
            expect_timeout,
        }
    }

    /// Runs the 7-step connect/init handshake between `peer_a` and `peer_b`.
    ///
    /// The second `init` advertises `additional_bits` on top of the global features.
    /// Fails only if the gateway cannot be acquired; step failures are reported in the
    /// summary.
    #[instrument(level = "debug", skip_all, fields(peer_a = %peer_a, peer_b = %peer_b))]
    pub async fn run_handshake(
        &self,
        peer_a: PeerIdentity,
        peer_b: PeerIdentity,
        additional_bits: &[u32],
    ) -> Result<SequenceSummary, GatewayError> {
        let sequence_id = next_sequence_id(&peer_a);

        let mut handle = match self.fresh_handle().await {
            Ok(h) => h,
            Err(e) => {
                self.bus.publish(
                    Event::now(EventKind::Error)
                        .with_sequence(sequence_id.as_str())
                        .with_data(json!({ "error": e.to_string(), "kind": e.as_label() })),
                );
                return Err(e);
            }
        };

        let sequence = Sequence::handshake(
            sequence_id,
            peer_a,
            peer_b,
            handle.features(true, &[]),
            handle.features(true, additional_bits),
            self.expect_timeout.as_millis() as u64,
        );
        info!(sequence_id = sequence.id(), steps = sequence.len(), "handshake started");

        let summary = self.execute(&mut handle, &sequence).await;
        drop(handle);

        self.bus.publish(
            Event::now(EventKind::SequenceComplete)
                .with_sequence(summary.sequence_id.as_str())
                .with_total_steps(summary.total_steps)
                .with_data(json!({
                    "steps_completed": summary.steps_completed,
                    "failed_steps": summary.failed_steps.len(),
                })),
        );
        info!(
            sequence_id = %summary.sequence_id,
            completed = summary.steps_completed,
            failed = summary.failed_steps.len(),
            "handshake complete"
        );
        Ok(summary)
    }

    /// Acquires the runner and drops any connection left by an earlier request,
    /// so step 1 always opens a new connection.
    async fn fresh_handle(&self) -> Result<RunnerHandle, GatewayError> {
        let mut handle = self.gateway.acquire().await?;
        if let Some(stale) = handle.connected_peer() {
            debug!(peer = %stale, "closing leftover connection before handshake");
            handle.disconnect().await?;
        }
        Ok(handle)
    }

    /// Runs every action of `sequence` on `handle`, publishing one event per step.
    async fn execute(&self, handle: &mut RunnerHandle, sequence: &Sequence) -> SequenceSummary {
        let mut summary = SequenceSummary {
            sequence_id: sequence.id().to_string(),
            steps_completed: 0,
            total_steps: sequence.len() as u32,
            failed_steps: Vec::new(),
        };

        for (idx, action) in sequence.actions().iter().enumerate() {
            let step = idx as u32 + 1;
            match self.perform(handle, action).await {
                Ok(payload) => {
                    summary.steps_completed += 1;
                    self.bus.publish(
                        Event::now(action.event_kind())
                            .with_sequence(sequence.id())
                            .with_step(step)
                            .with_direction(action.direction())
                            .with_data(payload),
                    );
                }
                Err(err) => {
                    warn!(sequence_id = sequence.id(), step, action = %action.label(), error = %err.message(), "step failed");
                    self.bus.publish(
                        Event::now(EventKind::Error)
                            .with_sequence(sequence.id())
                            .with_step(step)
                            .with_direction(action.direction())
                            .with_data(json!({
                                "error": err.message(),
                                "kind": err.as_label(),
                                "action": action.label(),
                            })),
                    );
                    summary.failed_steps.push(StepFailure {
                        step,
                        action: action.label(),
                        kind: err.as_label(),
                        error: err.message(),
                    });
                }
            }
        }
        summary
    }

    /// Performs one action and returns the payload describing what happened.
    async fn perform(&self, handle: &mut RunnerHandle, action: &Action) -> Result<Value, StepError> {
        match action {
            Action::Connect { peer } => {
                handle.connect(peer).await?;
                Ok(action.payload())
            }
            Action::Disconnect => {
                handle.disconnect().await?;
                Ok(action.payload())
            }
            Action::SendMessage { msg_type, fields } => {
                let sent = handle.send(msg_type, fields.clone()).await?;
                Ok(message_payload(msg_type, &sent))
            }
            Action::ExpectMessage {
                msg_type,
                timeout_ms,
            } => match handle
                .expect(msg_type, Duration::from_millis(*timeout_ms))
                .await?
            {
                Some(received) => Ok(message_payload(msg_type, &received)),
                None => Err(StepError::Timeout {
                    after_ms: *timeout_ms,
                }),
            },
        }
    }

    /// Sends one ad-hoc message (awaiting its response when one is expected) and
    /// publishes the request and response events.
    ///
    /// On failure a single `Error` event is published in place of the request event.
    pub async fn run_single(
        &self,
        peer: Option<&PeerIdentity>,
        msg_type: &str,
        fields: Fields,
    ) -> Result<Exchange, GatewayError> {
        let result = self
            .correlator
            .send_and_maybe_expect(peer, msg_type, fields, self.expect_timeout)
            .await;

        match &result {
            Ok(exchange) => {
                self.bus.publish(
                    Event::now(EventKind::Msg)
                        .with_direction(Direction::Out)
                        .with_data(exchange.request_payload()),
                );
                if let Some(payload) = exchange.response_payload() {
                    self.bus.publish(
                        Event::now(EventKind::Msg)
                            .with_direction(Direction::In)
                            .with_data(payload),
                    );
                }
            }
            Err(e) => {
                warn!(msg_type, error = %e, "single exchange failed");
                self.bus.publish(Event::now(EventKind::Error).with_data(json!({
                    "error": e.to_string(),
                    "kind": e.as_label(),
                    "action": format!("send({msg_type})"),
                })));
            }
        }
        result
    }

    /// Correlator used for single exchanges.
    pub fn correlator(&self) -> &ActionCorrelator {
        &self.correlator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::MessageClassifier;
    use crate::runner::{DummyRunner, PeerRunner};

    fn executor(runner: fn() -> DummyRunner) -> (SequenceExecutor, Bus, Arc<RunnerGateway>) {
        let bus = Bus::new(64);
        let gw = Arc::new(RunnerGateway::new(move || Box::new(runner()) as Box<dyn PeerRunner>));
        let corr = ActionCorrelator::new(Arc::clone(&gw), MessageClassifier::standard(), "03".into());
        let exec = SequenceExecutor::new(Arc::clone(&gw), corr, bus.clone(), Duration::from_millis(200));
        (exec, bus, gw)
    }

    #[tokio::test]
    async fn test_handshake_publishes_steps_then_completion() {
        let (exec, bus, _gw) = executor(DummyRunner::default);
        let mut sub = bus.subscribe();

        let summary = exec
            .run_handshake("03".into(), "02".into(), &[99])
            .await
            .unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.steps_completed, 7);

        let mut events = Vec::new();
        while let Some(ev) = sub.try_recv() {
            events.push(ev);
        }
        assert_eq!(events.len(), 8);
        for (i, ev) in events[..7].iter().enumerate() {
            assert_eq!(ev.step, Some(i as u32 + 1));
            assert_eq!(ev.sequence_id.as_deref(), Some(summary.sequence_id.as_str()));
        }
        assert_eq!(events[1].kind, EventKind::ExpectMsg);
        assert_eq!(events[1].direction, Direction::In);
        assert_eq!(events[1].data["features"], "82");
        assert_eq!(events[3].kind, EventKind::Disconnect);
        assert!(events[7].is_sequence_complete());
        assert_eq!(events[7].total_steps, Some(7));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort() {
        let (exec, bus, _gw) = executor(|| DummyRunner::default().rejecting("init"));
        let mut sub = bus.subscribe();

        let summary = exec
            .run_handshake("03".into(), "02".into(), &[])
            .await
            .unwrap();
        assert_eq!(summary.steps_completed, 5);
        let failed: Vec<_> = summary.failed_steps.iter().map(|f| f.step).collect();
        assert_eq!(failed, vec![3, 7]);

        let mut kinds = Vec::new();
        while let Some(ev) = sub.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(kinds.len(), 8);
        assert_eq!(kinds[2], EventKind::Error);
        assert_eq!(kinds[7], EventKind::SequenceComplete);
    }

    #[tokio::test]
    async fn test_not_running_fails_whole_handshake() {
        let (exec, bus, gw) = executor(DummyRunner::default);
        gw.teardown().await.unwrap();
        let mut sub = bus.subscribe();

        let err = exec
            .run_handshake("03".into(), "02".into(), &[])
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NotRunning);
        assert!(sub.try_recv().is_some_and(|ev| ev.is_error()));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_single_publishes_request_and_response() {
        let (exec, bus, _gw) = executor(DummyRunner::default);
        let mut sub = bus.subscribe();

        let ex = exec.run_single(None, "ping", Fields::new()).await.unwrap();
        assert!(ex.matched);

        let out = sub.try_recv().unwrap();
        let inb = sub.try_recv().unwrap();
        assert_eq!((out.kind, out.direction), (EventKind::Msg, Direction::Out));
        assert_eq!((inb.kind, inb.direction), (EventKind::Msg, Direction::In));
        assert_eq!(inb.data["msgtype"], "pong");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_single_failure_publishes_error() {
        let (exec, bus, _gw) = executor(|| DummyRunner::default().rejecting("ping"));
        let mut sub = bus.subscribe();

        assert!(exec.run_single(None, "ping", Fields::new()).await.is_err());
        let ev = sub.try_recv().unwrap();
        assert!(ev.is_error());
        assert_eq!(ev.data["action"], "send(ping)");
        assert!(sub.try_recv().is_none());
    }
}

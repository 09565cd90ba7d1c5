//! # Protocol activity events published to live observers.
//!
//! The [`EventKind`] enum classifies every observable protocol action:
//! - **Connection events**: `Connect`, `Disconnect`
//! - **Message events**: `Msg` (sent or received), `ExpectMsg` (an awaited message arrived)
//! - **Terminal events**: `SequenceComplete`, `Error`
//!
//! The [`Event`] struct carries the sequence/step position, direction and a JSON
//! payload. Its serialized form is the wire format of the live stream:
//!
//! ```json
//! {"sequence_id":"seq_03_1700000000000","step":1,"direction":"out","event":"Connect","data":{"connprivkey":"03"},"timestamp":1700000000000}
//! ```
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//! Within one handshake sequence `step` is contiguous and starts at 1.
//!
//! ## Example
//! ```rust
//! use peervisor::{Direction, Event, EventKind};
//!
//! let ev = Event::now(EventKind::Connect)
//!     .with_sequence("seq_03_1")
//!     .with_step(1)
//!     .with_direction(Direction::Out)
//!     .with_data(serde_json::json!({"connprivkey": "03"}));
//!
//! assert_eq!(ev.kind, EventKind::Connect);
//! assert_eq!(ev.step, Some(1));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of protocol activity events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// A simulated connection to a peer was opened.
    ///
    /// Sets: `data.connprivkey` (peer identity).
    Connect,

    /// The current connection was closed.
    Disconnect,

    /// A protocol message was sent (`out`) or received (`in`).
    ///
    /// Sets: `data.msgtype` plus the message fields.
    Msg,

    /// An awaited message arrived.
    ///
    /// Sets: `data.msgtype` plus the received fields.
    ExpectMsg,

    /// A handshake sequence finished (published exactly once, last).
    ///
    /// Sets: `total_steps`, `data.steps_completed`, `data.failed_steps`.
    #[serde(rename = "sequence_complete")]
    SequenceComplete,

    /// An action failed (runner error, timeout, not running).
    ///
    /// Sets: `data.error`, `data.kind`, and `data.action` describing the failed action.
    Error,
}

impl EventKind {
    /// Returns the wire name of the kind (as it appears in the `event` field).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "Connect",
            EventKind::Disconnect => "Disconnect",
            EventKind::Msg => "Msg",
            EventKind::ExpectMsg => "ExpectMsg",
            EventKind::SequenceComplete => "sequence_complete",
            EventKind::Error => "Error",
        }
    }
}

/// Direction of a protocol action relative to the local runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the remote peer.
    In,
    /// Initiated by the local runner.
    Out,
}

/// One unit of observable protocol activity.
///
/// - `seq`: monotonic global sequence for ordering (not part of the wire form)
/// - `timestamp`: wall-clock milliseconds since the Unix epoch
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    #[serde(skip)]
    pub seq: u64,

    /// Handshake sequence this event belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    /// 1-based step index within the sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    /// Direction of the action.
    pub direction: Direction,
    /// Event classification.
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// Total number of steps (set on `SequenceComplete` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    /// Action payload.
    pub data: Value,
    /// Wall-clock timestamp in milliseconds.
    pub timestamp: u64,
}

impl Event {
    /// Creates a new outbound event of the given kind with the current timestamp,
    /// the next sequence number and an empty payload.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            sequence_id: None,
            step: None,
            direction: Direction::Out,
            kind,
            total_steps: None,
            data: Value::Object(Default::default()),
            timestamp: now_millis(),
        }
    }

    /// Attaches the owning sequence id.
    #[inline]
    pub fn with_sequence(mut self, id: impl Into<String>) -> Self {
        self.sequence_id = Some(id.into());
        self
    }

    /// Attaches a 1-based step index.
    #[inline]
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets the direction.
    #[inline]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Replaces the payload.
    #[inline]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Attaches the total step count.
    #[inline]
    pub fn with_total_steps(mut self, total: u32) -> Self {
        self.total_steps = Some(total);
        self
    }

    /// Serializes the event into its wire form.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error)
    }

    #[inline]
    pub fn is_sequence_complete(&self) -> bool {
        matches!(self.kind, EventKind::SequenceComplete)
    }
}

/// Milliseconds since the Unix epoch (0 if the clock is before the epoch).
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::now(EventKind::Connect);
        let b = Event::now(EventKind::Connect);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_step_event_wire_shape() {
        let ev = Event::now(EventKind::ExpectMsg)
            .with_sequence("seq_03_42")
            .with_step(2)
            .with_direction(Direction::In)
            .with_data(json!({"msgtype": "init"}));

        let wire = ev.to_json();
        assert_eq!(wire["sequence_id"], "seq_03_42");
        assert_eq!(wire["step"], 2);
        assert_eq!(wire["direction"], "in");
        assert_eq!(wire["event"], "ExpectMsg");
        assert_eq!(wire["data"]["msgtype"], "init");
        assert!(wire["timestamp"].as_u64().is_some());
        assert!(wire.get("seq").is_none());
        assert!(wire.get("total_steps").is_none());
    }

    #[test]
    fn test_completion_event_wire_shape() {
        let ev = Event::now(EventKind::SequenceComplete)
            .with_sequence("seq_03_42")
            .with_total_steps(7);

        let wire = ev.to_json();
        assert_eq!(wire["event"], "sequence_complete");
        assert_eq!(wire["total_steps"], 7);
        assert!(wire.get("step").is_none());
        assert!(ev.is_sequence_complete());
    }

    #[test]
    fn test_kind_names_match_wire() {
        for kind in [
            EventKind::Connect,
            EventKind::Disconnect,
            EventKind::Msg,
            EventKind::ExpectMsg,
            EventKind::SequenceComplete,
            EventKind::Error,
        ] {
            let wire = Event::now(kind).to_json();
            assert_eq!(wire["event"], kind.as_str());
        }
    }
}

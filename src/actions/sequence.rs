//! # Ordered action scripts.
//!
//! A [`Sequence`] bundles an ordered list of [`Action`]s with a unique id.
//! It is created per handshake invocation and discarded after completion.
//!
//! ## Handshake script
//! ```text
//! 1. Connect(peer_a)
//! 2. ExpectMessage(init)
//! 3. SendMessage(init, globalfeatures = features(global))
//! 4. Disconnect
//! 5. Connect(peer_b)
//! 6. ExpectMessage(init)
//! 7. SendMessage(init, globalfeatures = features(global, additional bits))
//! ```
//!
//! ## Ids
//! `seq_<peer>_<unix-millis>`. The timestamp part is bumped past the last issued one,
//! so ids stay unique within the process even for same-millisecond invocations.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::json;

use crate::events::now_millis;
use crate::runner::{Fields, PeerIdentity};

use super::action::Action;

/// Last timestamp handed out by [`next_sequence_id`].
static LAST_SEQUENCE_TS: AtomicU64 = AtomicU64::new(0);

/// Generates a new unique sequence id for `peer`.
pub fn next_sequence_id(peer: &PeerIdentity) -> String {
    let now = now_millis();
    let prev = LAST_SEQUENCE_TS
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    let ts = now.max(prev + 1);
    format!("seq_{peer}_{ts}")
}

/// Ordered list of actions with a unique id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    id: String,
    actions: Vec<Action>,
}

impl Sequence {
    /// Creates a sequence from explicit actions.
    pub fn new(id: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            id: id.into(),
            actions,
        }
    }

    /// Builds the 7-step handshake script.
    ///
    /// ### Parameters
    /// - `peer_a` / `peer_b`: counterparties of the first and second connection
    /// - `global_features`: `globalfeatures` sent on the first connection
    /// - `extended_features`: `globalfeatures` sent on the second connection
    /// - `timeout_ms`: wait bound of both `ExpectMessage(init)` steps
    pub fn handshake(
        id: impl Into<String>,
        peer_a: PeerIdentity,
        peer_b: PeerIdentity,
        global_features: String,
        extended_features: String,
        timeout_ms: u64,
    ) -> Self {
        Self::new(
            id,
            vec![
                Action::Connect { peer: peer_a },
                Action::expect("init", timeout_ms),
                Action::send("init", globalfeatures(global_features)),
                Action::Disconnect,
                Action::Connect { peer: peer_b },
                Action::expect("init", timeout_ms),
                Action::send("init", globalfeatures(extended_features)),
            ],
        )
    }

    /// Returns the sequence id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the actions in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn globalfeatures(bits: String) -> Fields {
    let mut fields = Fields::new();
    fields.insert("globalfeatures".into(), json!(bits));
    fields
}

/// A step that failed while its sequence kept running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// 1-based step index.
    pub step: u32,
    /// Label of the failed action.
    pub action: String,
    /// Stable error label (`runner_error`, `timeout`, `not_running`).
    pub kind: &'static str,
    /// Human-readable error message.
    pub error: String,
}

/// Synchronous result of a handshake sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceSummary {
    /// Id of the executed sequence.
    pub sequence_id: String,
    /// Number of steps that succeeded.
    pub steps_completed: u32,
    /// Number of steps in the script.
    pub total_steps: u32,
    /// Steps that failed, in step order.
    pub failed_steps: Vec<StepFailure>,
}

impl SequenceSummary {
    /// True when every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

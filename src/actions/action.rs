//! # Protocol actions.
//!
//! An [`Action`] is one immutable step executed against the peer runner:
//! connect, disconnect, send a message, or wait for one.
//!
//! Every action knows how it is shown on the live stream: its [`EventKind`],
//! its [`Direction`] and its payload.
//!
//! ## Example
//! ```rust
//! use peervisor::{Action, Direction, EventKind};
//!
//! let connect = Action::connect("03");
//! assert_eq!(connect.event_kind(), EventKind::Connect);
//! assert_eq!(connect.direction(), Direction::Out);
//! assert_eq!(connect.payload()["connprivkey"], "03");
//!
//! let expect = Action::expect("init", 5_000);
//! assert_eq!(expect.direction(), Direction::In);
//! ```

use serde::Serialize;
use serde_json::{Value, json};

use crate::events::{Direction, EventKind};
use crate::runner::{Fields, PeerIdentity};

/// One protocol action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Open a connection to `peer`.
    Connect {
        /// Counterparty to connect to.
        peer: PeerIdentity,
    },
    /// Close the current connection.
    Disconnect,
    /// Send a message of `msg_type` with `fields`.
    SendMessage {
        /// Protocol message name.
        msg_type: String,
        /// Message fields.
        fields: Fields,
    },
    /// Wait up to `timeout_ms` for a message of `msg_type`.
    ExpectMessage {
        /// Protocol message name.
        msg_type: String,
        /// Maximum wait in milliseconds.
        timeout_ms: u64,
    },
}

impl Action {
    /// Shorthand for [`Action::Connect`].
    pub fn connect(peer: impl Into<PeerIdentity>) -> Self {
        Action::Connect { peer: peer.into() }
    }

    /// Shorthand for [`Action::SendMessage`].
    pub fn send(msg_type: impl Into<String>, fields: Fields) -> Self {
        Action::SendMessage {
            msg_type: msg_type.into(),
            fields,
        }
    }

    /// Shorthand for [`Action::ExpectMessage`].
    pub fn expect(msg_type: impl Into<String>, timeout_ms: u64) -> Self {
        Action::ExpectMessage {
            msg_type: msg_type.into(),
            timeout_ms,
        }
    }

    /// Event kind used when this action is published.
    pub fn event_kind(&self) -> EventKind {
        match self {
            Action::Connect { .. } => EventKind::Connect,
            Action::Disconnect => EventKind::Disconnect,
            Action::SendMessage { .. } => EventKind::Msg,
            Action::ExpectMessage { .. } => EventKind::ExpectMsg,
        }
    }

    /// Direction of the action (`in` only for awaited messages).
    pub fn direction(&self) -> Direction {
        match self {
            Action::ExpectMessage { .. } => Direction::In,
            _ => Direction::Out,
        }
    }

    /// Stream payload describing the action as requested.
    pub fn payload(&self) -> Value {
        match self {
            Action::Connect { peer } => json!({ "connprivkey": peer }),
            Action::Disconnect => json!({}),
            Action::SendMessage { msg_type, fields } => message_payload(msg_type, fields),
            Action::ExpectMessage { msg_type, .. } => json!({ "msgtype": msg_type }),
        }
    }

    /// Short label used in logs and error payloads.
    pub fn label(&self) -> String {
        match self {
            Action::Connect { peer } => format!("connect({peer})"),
            Action::Disconnect => "disconnect".to_string(),
            Action::SendMessage { msg_type, .. } => format!("send({msg_type})"),
            Action::ExpectMessage { msg_type, .. } => format!("expect({msg_type})"),
        }
    }
}

/// `{"msgtype": <type>, ...fields}`; a field named `msgtype` is overridden.
pub(crate) fn message_payload(msg_type: &str, fields: &Fields) -> Value {
    let mut data = fields.clone();
    data.insert("msgtype".into(), json!(msg_type));
    Value::Object(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_payload_merges_fields() {
        let mut fields = Fields::new();
        fields.insert("globalfeatures".into(), json!("08"));
        let action = Action::send("init", fields);

        let payload = action.payload();
        assert_eq!(payload["msgtype"], "init");
        assert_eq!(payload["globalfeatures"], "08");
        assert_eq!(action.event_kind(), EventKind::Msg);
        assert_eq!(action.label(), "send(init)");
    }

    #[test]
    fn test_disconnect_payload_is_empty_object() {
        assert_eq!(Action::Disconnect.payload(), json!({}));
        assert_eq!(Action::Disconnect.direction(), Direction::Out);
    }

    #[test]
    fn test_serialized_tag() {
        let wire = serde_json::to_value(Action::expect("init", 10)).unwrap();
        assert_eq!(wire["action"], "expect_message");
        assert_eq!(wire["timeout_ms"], 10);
    }
}

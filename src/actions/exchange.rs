//! # Request/response exchange records.
//!
//! An [`Exchange`] pairs one outbound message with its correlated inbound response,
//! or records that the response did not arrive in time. A timeout is a normal,
//! reportable outcome: `matched = false`, `timed_out = true`, no response fields.
//!
//! Unknown message types produce a [`ExchangeKind::Passthrough`] exchange that echoes
//! the caller's content without involving the runner.

use serde::Serialize;
use serde_json::{Value, json};

use crate::runner::Fields;

use super::action::message_payload;

/// How an exchange was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Sent through the runner (with or without an expected response).
    Correlated,
    /// Unknown message type echoed without runner involvement.
    Passthrough,
}

/// Outcome of correlating a sent message with its optional expected response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    /// Handling path.
    pub kind: ExchangeKind,
    /// Type of the sent message.
    pub request_type: String,
    /// Fields actually transmitted (or echoed, for passthrough).
    pub request_fields: Fields,
    /// Response type the classifier expected, if any.
    pub expected_response_type: Option<String>,
    /// Type of the received response, if any.
    pub response_type: Option<String>,
    /// Fields of the received response, if any.
    pub response_fields: Option<Fields>,
    /// True when the expected response arrived.
    pub matched: bool,
    /// True when a response was expected but did not arrive in time.
    pub timed_out: bool,
    /// Wall time from send to response (or timeout), in milliseconds.
    pub elapsed_ms: u64,
}

impl Exchange {
    /// Creates a passthrough exchange echoing `content` unchanged.
    pub fn passthrough(msg_type: impl Into<String>, content: Fields) -> Self {
        Self {
            kind: ExchangeKind::Passthrough,
            request_type: msg_type.into(),
            request_fields: content,
            expected_response_type: None,
            response_type: None,
            response_fields: None,
            matched: false,
            timed_out: false,
            elapsed_ms: 0,
        }
    }

    /// True for the passthrough path.
    pub fn is_passthrough(&self) -> bool {
        matches!(self.kind, ExchangeKind::Passthrough)
    }

    /// Stream payload of the request half.
    pub fn request_payload(&self) -> Value {
        message_payload(&self.request_type, &self.request_fields)
    }

    /// Stream payload of the response half, if a response arrived.
    pub fn response_payload(&self) -> Option<Value> {
        match (&self.response_type, &self.response_fields) {
            (Some(t), Some(f)) => Some(message_payload(t, f)),
            _ => None,
        }
    }

    /// Request and response records in exchange order, as returned to HTTP callers.
    pub fn messages(&self) -> Vec<Value> {
        let mut out = vec![json!({
            "direction": "out",
            "msg_name": self.request_type,
            "payload": self.request_fields,
        })];
        if let (Some(t), Some(f)) = (&self.response_type, &self.response_fields) {
            out.push(json!({
                "direction": "in",
                "msg_name": t,
                "payload": f,
            }));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_echoes_content() {
        let mut content = Fields::new();
        content.insert("color".into(), json!("yellow"));
        let ex = Exchange::passthrough("banana", content.clone());

        assert!(ex.is_passthrough());
        assert_eq!(ex.request_fields, content);
        assert!(!ex.matched);
        assert!(ex.response_payload().is_none());
        assert_eq!(ex.messages().len(), 1);
        assert_eq!(ex.request_payload()["msgtype"], "banana");
    }

    #[test]
    fn test_messages_pair_request_and_response() {
        let mut ex = Exchange::passthrough("ping", Fields::new());
        ex.kind = ExchangeKind::Correlated;
        ex.response_type = Some("pong".into());
        ex.response_fields = Some(Fields::new());
        ex.matched = true;

        let msgs = ex.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["direction"], "out");
        assert_eq!(msgs[1]["msg_name"], "pong");
        assert_eq!(ex.response_payload().unwrap()["msgtype"], "pong");
    }
}

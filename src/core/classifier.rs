//! # Message classifier.
//!
//! Maps a protocol message name to "is this a known message" and "which response
//! type, if any, should be awaited after sending it".
//!
//! ```text
//! init            → init
//! ping            → pong
//! open_channel    → accept_channel
//! funding_created → funding_signed
//! shutdown        → shutdown
//! closing_signed  → closing_signed
//! ```
//!
//! Every other known message is fire-and-forget. Unknown names are reported as
//! such; the correlator echoes them back without touching the runner.

use std::collections::HashMap;

/// Known messages and their expected response (`None` = no response awaited).
const STANDARD_MESSAGES: &[(&str, Option<&str>)] = &[
    ("init", Some("init")),
    ("error", None),
    ("warning", None),
    ("ping", Some("pong")),
    ("pong", None),
    ("open_channel", Some("accept_channel")),
    ("accept_channel", None),
    ("funding_created", Some("funding_signed")),
    ("funding_signed", None),
    ("channel_ready", None),
    ("shutdown", Some("shutdown")),
    ("closing_signed", Some("closing_signed")),
    ("update_add_htlc", None),
    ("update_fulfill_htlc", None),
    ("update_fail_htlc", None),
    ("update_fail_malformed_htlc", None),
    ("commitment_signed", None),
    ("revoke_and_ack", None),
    ("update_fee", None),
    ("channel_reestablish", None),
];

/// Result of classifying a message name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// True if the message name is in the vocabulary.
    pub known: bool,
    /// Response type to await after sending, if any.
    pub expected_response: Option<String>,
}

/// Static vocabulary of protocol messages.
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    table: HashMap<String, Option<String>>,
}

impl MessageClassifier {
    /// Vocabulary of the standard peer protocol.
    pub fn standard() -> Self {
        let table = STANDARD_MESSAGES
            .iter()
            .map(|(name, resp)| (name.to_string(), resp.map(str::to_string)))
            .collect();
        Self { table }
    }

    /// Adds (or overrides) a message and its expected response.
    pub fn with_message(mut self, name: impl Into<String>, response: Option<&str>) -> Self {
        self.table.insert(name.into(), response.map(str::to_string));
        self
    }

    /// Classifies `msg_type`.
    pub fn classify(&self, msg_type: &str) -> Classification {
        match self.table.get(msg_type) {
            Some(resp) => Classification {
                known: true,
                expected_response: resp.clone(),
            },
            None => Classification {
                known: false,
                expected_response: None,
            },
        }
    }

    /// True if `msg_type` is in the vocabulary.
    pub fn is_known(&self, msg_type: &str) -> bool {
        self.table.contains_key(msg_type)
    }
}

impl Default for MessageClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_response_pairs() {
        let c = MessageClassifier::standard();
        for (req, resp) in [
            ("init", "init"),
            ("ping", "pong"),
            ("open_channel", "accept_channel"),
            ("funding_created", "funding_signed"),
            ("shutdown", "shutdown"),
            ("closing_signed", "closing_signed"),
        ] {
            let got = c.classify(req);
            assert!(got.known, "{req}");
            assert_eq!(got.expected_response.as_deref(), Some(resp), "{req}");
        }
    }

    #[test]
    fn test_fire_and_forget_and_unknown() {
        let c = MessageClassifier::standard();
        assert_eq!(
            c.classify("pong"),
            Classification {
                known: true,
                expected_response: None
            }
        );
        assert!(!c.classify("banana").known);
        assert!(!c.is_known(""));
    }

    #[test]
    fn test_extension() {
        let c = MessageClassifier::standard().with_message("custom_ping", Some("custom_pong"));
        assert_eq!(
            c.classify("custom_ping").expected_response.as_deref(),
            Some("custom_pong")
        );
    }
}

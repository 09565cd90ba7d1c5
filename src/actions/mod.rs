//! # Action data model.
//!
//! This module provides the immutable values the executor works with:
//! - [`Action`] - one protocol step (connect, disconnect, send, expect)
//! - [`Sequence`] - ordered actions with a unique id
//! - [`Exchange`] - request paired with its correlated response (or timeout)
//! - [`SequenceSummary`], [`StepFailure`] - synchronous handshake result

mod action;
mod exchange;
mod sequence;

pub use action::Action;
pub use exchange::{Exchange, ExchangeKind};
pub use sequence::{Sequence, SequenceSummary, StepFailure, next_sequence_id};

pub(crate) use action::message_payload;

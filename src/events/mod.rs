//! Protocol activity events: types and the publish/subscribe bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the sequence executor.
//!
//! ## Contents
//! - [`EventKind`], [`Direction`], [`Event`] event classification and payload
//! - [`Bus`], [`Subscription`] broadcast fan-out; lagging receivers drop their oldest events
//!
//! ## Quick reference
//! - **Publishers**: `SequenceExecutor` (handshake steps and ad-hoc exchanges).
//! - **Consumers**: WebSocket clients (one `Subscription` each) and the
//!   `SubscriberSet` workers driving `LogWriter` and `RecentEvents`.

mod bus;
mod event;

pub use bus::{Bus, Subscription};
pub use event::{Direction, Event, EventKind};

pub(crate) use event::now_millis;

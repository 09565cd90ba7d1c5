//! # In-process event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] that drives
//! subscribers from the [`Bus`](crate::events::Bus), and built-in implementations.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   SequenceExecutor ── publish(Event) ──► Bus ──► one Subscription per subscriber
//!                                                    │
//!                                                    ├──► worker ──► LogWriter
//!                                                    ├──► worker ──► RecentEvents (/messages)
//!                                                    └──► worker ──► Custom ...
//! ```
//!
//! WebSocket clients do not go through this module: each client holds its own
//! [`Subscription`](crate::events::Subscription) and forwards events at its own pace.

mod history;
mod log;
mod set;
mod subscriber;

pub use history::RecentEvents;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;

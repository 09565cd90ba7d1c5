//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging in-process event handlers
//! into the orchestrator (logging, diagnostics, metrics).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently of the publisher)
//! - **Its own bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged)
//!
//! ## Architecture
//! ```text
//! Bus ──► listener ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                                      └─► panic caught → logged, worker continues
//! ```
//!
//! ## Overflow behavior
//! A full queue drops the incoming event and logs a warning. Other subscribers are unaffected.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use peervisor::{Event, EventKind, Subscribe};
//!
//! struct ErrorCounter;
//!
//! #[async_trait]
//! impl Subscribe for ErrorCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::Error) {
//!             // export a metric, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "error-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// In-process event subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing only causes this subscriber's own queue to shed events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, never in the publisher context.
    /// Events are delivered in publish order.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber (clamped to a minimum of 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}

//! # SubscriberSet: worker-per-subscriber fan-out from the bus
//!
//! [`SubscriberSet`] attaches in-process [`Subscribe`] implementations to the
//! [`Bus`]. One listener task holds a single bus [`Subscription`] and forwards
//! each event into a bounded `mpsc` queue per subscriber; a dedicated worker
//! drains each queue, so event handling never runs in the publisher's context.
//!
//! ## What it guarantees
//! - Per-subscriber FIFO (publish order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - A full queue drops the event for that subscriber only.
//!
//! ## What it does **not** guarantee
//! - No global progress across subscribers: one may lag behind another.
//! - No retries: events dropped on overflow are gone for that subscriber.
//!
//! ## Diagram
//! ```text
//!    Bus ──► listener ──┬──► [mpsc S1] ─► worker S1 ─► on_event()
//!                       ├──► [mpsc S2] ─► worker S2 ─► on_event()
//!                       └──► [mpsc SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::events::{Bus, Event, Subscription};

use super::Subscribe;

/// Per-subscriber channel metadata.
struct Channel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber worker metadata.
struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Composite fan-out with per-subscriber queues and worker tasks.
pub struct SubscriberSet {
    stop: CancellationToken,
    listener: JoinHandle<()>,
    workers: Vec<Worker>,
}

impl SubscriberSet {
    /// Subscribes to `bus` and spawns one worker per subscriber.
    ///
    /// Events published after this call returns are delivered.
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
                        let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        error!(subscriber = sub.name(), panic = %info, "subscriber panicked");
                    }
                }
            });

            channels.push(Channel { name, sender: tx });
            workers.push(Worker { name, handle });
        }

        let stop = CancellationToken::new();
        let listener = tokio::spawn(listen(bus.subscribe(), channels, stop.clone()));

        Self {
            stop,
            listener,
            workers,
        }
    }

    /// Graceful shutdown: stop listening, let every worker drain what is already
    /// queued, and await its completion.
    pub async fn shutdown(self) {
        self.stop.cancel();
        if let Err(e) = self.listener.await {
            error!(error = %e, "subscriber listener failed to join");
        }
        for w in self.workers {
            if let Err(e) = w.handle.await {
                error!(subscriber = w.name, error = %e, "subscriber worker failed to join");
            }
        }
    }

    /// Names of the attached subscribers, in attach order.
    pub fn names(&self) -> Vec<&'static str> {
        self.workers.iter().map(|w| w.name).collect()
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }
}

/// Forwards bus events to every channel until the bus closes or `stop` fires.
///
/// Dropping `channels` on return ends the workers once their queues are drained.
async fn listen(mut sub: Subscription, channels: Vec<Channel>, stop: CancellationToken) {
    loop {
        let next = tokio::select! {
            biased;
            ev = sub.recv() => Some(ev),
            _ = stop.cancelled() => None,
        };
        match next {
            Some(Some(ev)) => emit(&channels, ev),
            Some(None) => break,
            None => {
                while let Some(ev) = sub.try_recv() {
                    emit(&channels, ev);
                }
                break;
            }
        }
    }
    if sub.dropped() > 0 {
        warn!(dropped = sub.dropped(), "subscriber listener lagged behind the bus");
    }
}

fn emit(channels: &[Channel], ev: Arc<Event>) {
    for ch in channels {
        match ch.sender.try_send(Arc::clone(&ev)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscriber = ch.name, seq = ev.seq, "subscriber queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(subscriber = ch.name, "subscriber worker gone, event dropped");
            }
        }
    }
}

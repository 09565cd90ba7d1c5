//! # Bounded view of recently published events.
//!
//! [`RecentEvents`] keeps the last `capacity` events it observed so that
//! diagnostics (`GET /messages`) can answer "what happened lately" without the
//! orchestrator persisting anything.
//!
//! ## Architecture
//! ```text
//! Bus ──► SubscriberSet worker ──► RecentEvents::on_event()
//!                                         │
//!                                         ▼
//!                               VecDeque<Arc<Event>> (ring, arrival order)
//! ```
//!
//! ## Rules
//! - Events are kept in bus delivery order, which may differ from `seq` order
//!   when requests publish concurrently
//! - Oldest entries are evicted once `capacity` is reached
//! - Reads are eventually consistent with the bus

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Thread-safe ring of recent events.
pub struct RecentEvents {
    state: RwLock<VecDeque<Arc<Event>>>,
    capacity: usize,
}

impl RecentEvents {
    /// Creates an empty ring holding at most `capacity` events (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Appends an event, evicting the oldest one when full.
    pub async fn record(&self, ev: &Event) {
        let mut ring = self.state.write().await;
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(Arc::new(ev.clone()));
    }

    /// Returns up to `limit` most recent events, oldest first.
    pub async fn snapshot(&self, limit: usize) -> Vec<Arc<Event>> {
        let ring = self.state.read().await;
        let skip = ring.len().saturating_sub(limit);
        ring.iter().skip(skip).cloned().collect()
    }

    /// Returns every recorded event of one handshake sequence, in publish order.
    pub async fn sequence(&self, sequence_id: &str) -> Vec<Arc<Event>> {
        self.state
            .read()
            .await
            .iter()
            .filter(|ev| ev.sequence_id.as_deref() == Some(sequence_id))
            .cloned()
            .collect()
    }

    /// Number of recorded events.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl Subscribe for RecentEvents {
    async fn on_event(&self, event: &Event) {
        self.record(event).await;
    }

    fn name(&self) -> &'static str {
        "recent-events"
    }

    fn queue_capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_ring_evicts_oldest() {
        let ring = RecentEvents::new(2);
        for n in 1..=3 {
            ring.record(&Event::now(EventKind::Msg).with_step(n)).await;
        }

        let steps: Vec<_> = ring.snapshot(10).await.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn test_out_of_seq_events_are_kept_in_arrival_order() {
        let ring = RecentEvents::new(8);
        let first = Event::now(EventKind::Msg).with_sequence("a");
        let second = Event::now(EventKind::Msg).with_sequence("a");

        ring.record(&second).await;
        ring.record(&first).await;

        let seqs: Vec<_> = ring.sequence("a").await.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![second.seq, first.seq]);
        assert_eq!(ring.len().await, 2);
    }

    #[tokio::test]
    async fn test_snapshot_limit_and_sequence_filter() {
        let ring = RecentEvents::new(8);
        ring.record(&Event::now(EventKind::Connect).with_sequence("a").with_step(1))
            .await;
        ring.record(&Event::now(EventKind::Msg)).await;
        ring.record(&Event::now(EventKind::Disconnect).with_sequence("a").with_step(2))
            .await;

        assert_eq!(ring.snapshot(1).await.len(), 1);
        let seq: Vec<_> = ring.sequence("a").await.iter().map(|e| e.step).collect();
        assert_eq!(seq, vec![Some(1), Some(2)]);
    }
}

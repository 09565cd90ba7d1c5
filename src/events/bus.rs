//! # Event bus for broadcasting protocol activity.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from many concurrent request tasks.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                 Subscribers (many):
//!   SequenceExecutor ──┐          ┌──► Subscription::recv() (WebSocket client)
//!   ad-hoc requests  ──┼──► Bus ──┼──► Subscription::recv() (WebSocket client)
//!                      │ (broadcast) └──► SubscriberSet listener ──► LogWriter, RecentEvents
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never awaits and never fails.
//! - **Bounded**: one ring buffer of `capacity` events backs every receiver.
//! - **Lag handling**: a slow receiver skips its `n` oldest events (`RecvError::Lagged(n)`);
//!   the count is kept on its [`Subscription`]. Other receivers are unaffected.
//! - **Global order**: every subscriber observes events in the same send order.
//! - **No persistence**: events are lost if there are no subscribers at publish time.
//!
//! ## Unsubscribe
//! Dropping a [`Subscription`] removes its receiver. Removal may race an in-flight
//! publish; the subscriber simply stops receiving further events.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::Event;

/// Publish/subscribe hub for protocol activity events.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Lossy**: a stalled subscriber keeps only the `capacity` most recent events.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Arc<Event>>,
    closed: CancellationToken,
    capacity: usize,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// The minimum capacity is 1 (clamped); the channel rounds it up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Arc<Event>>(capacity);
        Self {
            tx,
            closed: CancellationToken::new(),
            capacity,
        }
    }

    /// Channel capacity: how far a subscriber may fall behind before losing events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new receiver that observes subsequently published events.
    ///
    /// A subscription only receives events **published after** it was created.
    pub fn subscribe(&self) -> Subscription {
        debug!(subscribers = self.tx.receiver_count() + 1, "subscriber registered");
        Subscription {
            rx: self.tx.subscribe(),
            closed: self.closed.clone(),
            dropped: 0,
        }
    }

    /// Removes a subscriber. Equivalent to dropping the subscription.
    pub fn unsubscribe(&self, sub: Subscription) {
        drop(sub);
        debug!(subscribers = self.tx.receiver_count(), "subscriber removed");
    }

    /// Publishes an event to every current subscriber.
    ///
    /// Takes ownership of the event; subscribers share it through an `Arc`.
    /// After [`close`](Self::close), events are discarded.
    pub fn publish(&self, ev: Event) {
        if self.closed.is_cancelled() {
            return;
        }
        let _ = self.tx.send(Arc::new(ev));
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Closes the bus: pending events can still be drained, after which
    /// `recv()` returns `None`. Later publishes are discarded.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// Receiving end of one subscriber.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<Arc<Event>>,
    closed: CancellationToken,
    dropped: u64,
}

impl Subscription {
    /// Waits for the next event.
    ///
    /// Lagged events are skipped and counted in [`dropped`](Self::dropped).
    /// Returns `None` once the bus is closed (or dropped) and every pending
    /// event has been drained.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            let res = tokio::select! {
                biased;
                res = self.rx.recv() => Some(res),
                _ = self.closed.cancelled() => None,
            };
            let Some(res) = res else {
                return self.try_recv();
            };
            match res {
                Ok(ev) => return Some(ev),
                Err(RecvError::Lagged(n)) => self.lagged(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.rx.try_recv() {
                Ok(ev) => return Some(ev),
                Err(TryRecvError::Lagged(n)) => self.lagged(n),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Number of events this subscriber has skipped so far because it lagged.
    ///
    /// Lag is detected on the next `recv`/`try_recv`, so the count trails the bus.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn lagged(&mut self, n: u64) {
        self.dropped += n;
        debug!(skipped = n, dropped = self.dropped, "subscriber lagged, oldest events dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::time::Duration;

    fn step(n: u32) -> Event {
        Event::now(EventKind::Msg).with_step(n)
    }

    fn steps(sub: &mut Subscription) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(ev) = sub.try_recv() {
            out.push(ev.step.unwrap_or(0));
        }
        out
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = Bus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for n in 1..=3 {
            bus.publish(step(n));
        }

        assert_eq!(steps(&mut a), vec![1, 2, 3]);
        assert_eq!(steps(&mut b), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_newest() {
        let bus = Bus::new(4);
        let mut sub = bus.subscribe();

        for n in 1..=6 {
            bus.publish(step(n));
        }

        assert_eq!(steps(&mut sub), vec![3, 4, 5, 6]);
        assert_eq!(sub.dropped(), 2);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_affect_others() {
        let bus = Bus::new(4);
        let mut fast = bus.subscribe();
        let mut slow = bus.subscribe();

        for n in 1..=10 {
            bus.publish(step(n));
            assert_eq!(fast.try_recv().and_then(|e| e.step), Some(n));
        }

        assert_eq!(steps(&mut slow), vec![7, 8, 9, 10]);
        assert_eq!(slow.dropped(), 6);
        assert_eq!(fast.dropped(), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = Bus::new(4);
        let sub = bus.subscribe();
        let mut other = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.unsubscribe(sub);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(step(1));
        assert_eq!(steps(&mut other), vec![1]);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = Bus::new(4);
        bus.publish(step(1));
        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_publish() {
        let bus = Bus::new(4);
        let mut sub = bus.subscribe();

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(step(7));
        });

        let ev = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timed out")
            .expect("subscription closed");
        assert_eq!(ev.step, Some(7));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let bus = Bus::new(4);
        let mut sub = bus.subscribe();
        bus.publish(step(1));
        bus.close();
        bus.publish(step(2));

        assert_eq!(sub.recv().await.and_then(|e| e.step), Some(1));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_bus_closes_subscriptions() {
        let bus = Bus::new(4);
        let mut sub = bus.subscribe();
        drop(bus);
        assert!(sub.recv().await.is_none());
    }
}

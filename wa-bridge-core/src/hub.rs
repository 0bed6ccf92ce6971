// ABOUTME: Event broadcast hub - registry of per-subscriber sinks with failure isolation
// ABOUTME: Pushes a state snapshot on subscribe, fans out events and heartbeats FIFO per sink

use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::events::{BridgeEvent, Frame};

/// Default number of frames a subscriber may fall behind before it is dropped.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Opaque handle identifying one subscriber in the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Hub for broadcasting frames to subscribers.
///
/// Each subscriber owns a bounded channel; the hub only keeps the sending half.
/// A push that fails (receiver gone, or buffer full because the subscriber
/// stalled) removes that subscriber without touching the others. The hub never
/// awaits, so a slow subscriber can never hold up the producer.
#[derive(Debug)]
pub struct EventHub {
    sinks: HashMap<SubscriberId, mpsc::Sender<Frame>>,
    next_id: u64,
    buffer: usize,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            sinks: HashMap::new(),
            next_id: 0,
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber. `snapshot` is queued as its first frame.
    pub fn subscribe(&mut self, snapshot: BridgeEvent) -> (SubscriberId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        // Fresh channel with capacity >= 1, so this cannot fail.
        let _ = tx.try_send(Frame::Event(snapshot));
        self.sinks.insert(id, tx);

        tracing::debug!(subscriber = id.0, total = self.sinks.len(), "Subscriber added");
        (id, rx)
    }

    /// Remove a subscriber. Idempotent.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let removed = self.sinks.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = id.0, total = self.sinks.len(), "Subscriber removed");
        }
        removed
    }

    /// Push an event to every subscriber. Returns how many accepted it.
    pub fn broadcast(&mut self, event: &BridgeEvent) -> usize {
        self.push_all(|| Frame::Event(event.clone()))
    }

    /// Push a heartbeat to every subscriber. Returns how many accepted it.
    pub fn heartbeat(&mut self) -> usize {
        self.push_all(|| Frame::Heartbeat)
    }

    /// Drop every subscriber. Their streams end once queued frames drain.
    pub fn close_all(&mut self) -> usize {
        let closed = self.sinks.len();
        self.sinks.clear();
        closed
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn push_all(&mut self, frame: impl Fn() -> Frame) -> usize {
        let mut failed = Vec::new();
        for (id, sink) in &self.sinks {
            if let Err(e) = sink.try_send(frame()) {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "stalled",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                };
                tracing::debug!(subscriber = id.0, reason, "Dropping subscriber after failed push");
                failed.push(*id);
            }
        }
        for id in &failed {
            self.sinks.remove(id);
        }
        self.sinks.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn test_subscribe_queues_snapshot_first() {
        let mut hub = EventHub::default();
        let (_id, mut rx) = hub.subscribe(BridgeEvent::connected(SessionState::Ready));
        hub.broadcast(&BridgeEvent::Disconnected {
            reason: "lost".to_string(),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            Frame::Event(BridgeEvent::Connected {
                ready: true,
                qr_pending: false
            })
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            Frame::Event(BridgeEvent::Disconnected { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_without_subscribers_doesnt_panic() {
        let mut hub = EventHub::default();
        assert_eq!(hub.broadcast(&BridgeEvent::Ready), 0);
        assert_eq!(hub.heartbeat(), 0);
    }

    #[test]
    fn test_closed_subscriber_is_removed_on_push() {
        let mut hub = EventHub::default();
        let (_a, rx_a) = hub.subscribe(BridgeEvent::connected(SessionState::Uninitialized));
        let (_b, mut rx_b) = hub.subscribe(BridgeEvent::connected(SessionState::Uninitialized));
        drop(rx_a);

        assert_eq!(hub.broadcast(&BridgeEvent::Ready), 1);
        assert_eq!(hub.len(), 1);

        rx_b.try_recv().unwrap();
        assert_eq!(rx_b.try_recv().unwrap(), Frame::Event(BridgeEvent::Ready));
    }

    #[test]
    fn test_stalled_subscriber_is_dropped() {
        let mut hub = EventHub::new(2);
        let (_slow, _rx_slow) = hub.subscribe(BridgeEvent::connected(SessionState::Ready));
        hub.broadcast(&BridgeEvent::Ready);
        // Buffer of 2 is now full (snapshot + ready); the next push drops it.
        assert_eq!(hub.heartbeat(), 0);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let mut hub = EventHub::default();
        let (id, _rx) = hub.subscribe(BridgeEvent::connected(SessionState::Ready));
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_per_subscriber_fifo() {
        let mut hub = EventHub::default();
        let (_id, mut rx) = hub.subscribe(BridgeEvent::connected(SessionState::Uninitialized));
        hub.broadcast(&BridgeEvent::Qr {
            qr: "one".to_string(),
        });
        hub.heartbeat();
        hub.broadcast(&BridgeEvent::Authenticated);

        rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Frame::Event(BridgeEvent::Qr {
                qr: "one".to_string()
            })
        );
        assert_eq!(rx.try_recv().unwrap(), Frame::Heartbeat);
        assert_eq!(rx.try_recv().unwrap(), Frame::Event(BridgeEvent::Authenticated));
    }
}

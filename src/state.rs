// ABOUTME: Single owned container for the session state and the subscriber hub
// ABOUTME: Snapshot-then-register and transition-then-broadcast happen under one lock, never across an await

use futures_util::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use wa_bridge_core::{
    BridgeEvent, ClientEvent, EventHub, Frame, SessionMachine, SessionState, SubscriberId,
};

struct Shared {
    machine: SessionMachine,
    hub: EventHub,
}

/// Shared bridge state handed to the event loop, dispatcher, and HTTP handlers.
///
/// Cheap to clone. Each instance built with `new` is fully isolated, so tests
/// construct their own.
#[derive(Clone)]
pub struct BridgeState {
    shared: Arc<Mutex<Shared>>,
}

impl std::fmt::Debug for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.lock();
        f.debug_struct("BridgeState")
            .field("state", &shared.machine.state())
            .field("subscribers", &shared.hub.len())
            .finish()
    }
}

impl BridgeState {
    pub fn new(subscriber_buffer: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                machine: SessionMachine::new(),
                hub: EventHub::new(subscriber_buffer),
            })),
        }
    }

    // A poisoned lock still holds a consistent state: every critical section is a
    // handful of non-panicking field updates.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn session_state(&self) -> SessionState {
        self.lock().machine.state()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().machine.is_ready()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().hub.len()
    }

    /// Register a subscriber. Its first frame is a `connected` snapshot of the
    /// state at this exact moment; every later event follows in order.
    pub fn subscribe(&self) -> Subscription {
        let mut shared = self.lock();
        let snapshot = BridgeEvent::connected(shared.machine.state());
        let (id, rx) = shared.hub.subscribe(snapshot);
        Subscription {
            id,
            rx,
            owner: Arc::downgrade(&self.shared),
        }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.lock().hub.unsubscribe(id);
    }

    /// Apply a lifecycle event from the adapter and broadcast it if accepted.
    /// Returns the resulting state, or `None` if the event was ignored.
    pub fn apply_lifecycle(&self, event: &ClientEvent) -> Option<SessionState> {
        let (Some(signal), Some(wire)) = (event.signal(), event.to_bridge_event()) else {
            return None;
        };

        let mut shared = self.lock();
        let from = shared.machine.state();
        match shared.machine.apply(signal) {
            Some(to) => {
                let delivered = shared.hub.broadcast(&wire);
                tracing::debug!(event = wire.kind(), delivered, "Lifecycle event broadcast");
                Some(to)
            }
            None => {
                tracing::debug!(
                    event = wire.kind(),
                    state = %from,
                    "Ignoring lifecycle event not valid in current state"
                );
                None
            }
        }
    }

    /// Broadcast an event that does not affect session state.
    pub fn publish(&self, event: BridgeEvent) -> usize {
        self.lock().hub.broadcast(&event)
    }

    /// Push a heartbeat to every subscriber.
    pub fn heartbeat(&self) -> usize {
        self.lock().hub.heartbeat()
    }

    /// End every open subscription, e.g. so a graceful server shutdown is not
    /// held open by event streams.
    pub fn close_subscribers(&self) -> usize {
        let closed = self.lock().hub.close_all();
        tracing::debug!(closed, "Closed all subscribers");
        closed
    }
}

/// A live subscription. Yields frames in production order and leaves the hub
/// when dropped.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Frame>,
    owner: Weak<Mutex<Shared>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.owner.upgrade() {
            shared
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .hub
                .unsubscribe(self.id);
        }
    }
}

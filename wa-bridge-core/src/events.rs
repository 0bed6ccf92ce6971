// ABOUTME: Internal event vocabulary for the bridge
// ABOUTME: ClientEvent (adapter -> bridge), BridgeEvent (wire frames), Frame (hub payloads)

use serde::{Deserialize, Serialize};

use crate::session::{LifecycleSignal, SessionState};

/// Incoming message exactly as the adapter reports it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawMessage {
    /// Network message identifier
    pub id: String,
    /// Network-form sender identifier (e.g. `15551234567@c.us`)
    pub from: String,
    /// True when the message was sent by the bridge's own account
    #[serde(default)]
    pub from_me: bool,
    /// Push name of the sender, if the network provided one
    #[serde(default)]
    pub notify_name: Option<String>,
    #[serde(default)]
    pub body: String,
    /// Seconds since Unix epoch, as supplied by the network
    pub timestamp: i64,
    #[serde(default)]
    pub has_media: bool,
}

/// Events produced by the session client adapter onto the bridge's ordered queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Qr(String),
    Authenticated,
    Ready,
    AuthFailure(String),
    Disconnected(String),
    Message(RawMessage),
}

impl ClientEvent {
    /// Lifecycle signal carried by this event, if any.
    pub fn signal(&self) -> Option<LifecycleSignal> {
        match self {
            ClientEvent::Qr(_) => Some(LifecycleSignal::PairingChallenge),
            ClientEvent::Authenticated => Some(LifecycleSignal::Authenticated),
            ClientEvent::Ready => Some(LifecycleSignal::Ready),
            ClientEvent::AuthFailure(_) => Some(LifecycleSignal::AuthFailure),
            ClientEvent::Disconnected(_) => Some(LifecycleSignal::Disconnected),
            ClientEvent::Message(_) => None,
        }
    }

    /// Wire event announcing this lifecycle event to subscribers.
    pub fn to_bridge_event(&self) -> Option<BridgeEvent> {
        match self {
            ClientEvent::Qr(qr) => Some(BridgeEvent::Qr { qr: qr.clone() }),
            ClientEvent::Authenticated => Some(BridgeEvent::Authenticated),
            ClientEvent::Ready => Some(BridgeEvent::Ready),
            ClientEvent::AuthFailure(message) => Some(BridgeEvent::AuthFailure {
                message: message.clone(),
            }),
            ClientEvent::Disconnected(reason) => Some(BridgeEvent::Disconnected {
                reason: reason.clone(),
            }),
            ClientEvent::Message(_) => None,
        }
    }
}

/// Canonical inbound message handed to subscribers. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    pub id: String,
    /// Normalized sender address (`+<digits>` for numeric senders)
    #[serde(rename = "from")]
    pub sender: String,
    /// Omitted from the frame when unknown, so consumers can fall back to `from`
    #[serde(rename = "from_name", skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    pub body: String,
    /// Path of the persisted attachment; present iff the message carried media
    /// and the download succeeded
    pub media_path: Option<String>,
    #[serde(rename = "timestamp")]
    pub received_at: i64,
}

/// Events delivered to subscribers as JSON frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Synthetic snapshot sent once to each new subscriber
    Connected { ready: bool, qr_pending: bool },
    Qr { qr: String },
    Authenticated,
    Ready,
    AuthFailure { message: String },
    Disconnected { reason: String },
    Message(InboundMessage),
}

impl BridgeEvent {
    pub fn connected(state: SessionState) -> Self {
        BridgeEvent::Connected {
            ready: state == SessionState::Ready,
            qr_pending: state == SessionState::QrPending,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BridgeEvent::Connected { .. } => "connected",
            BridgeEvent::Qr { .. } => "qr",
            BridgeEvent::Authenticated => "authenticated",
            BridgeEvent::Ready => "ready",
            BridgeEvent::AuthFailure { .. } => "auth_failure",
            BridgeEvent::Disconnected { .. } => "disconnected",
            BridgeEvent::Message(_) => "message",
        }
    }
}

/// A unit pushed through a subscriber's sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Event(BridgeEvent),
    /// Liveness ping; carries no data
    Heartbeat,
}

// ABOUTME: Platform-agnostic session lifecycle and event fan-out for the WhatsApp bridge
// ABOUTME: State machine, event vocabulary, subscriber hub, adapter trait, addressing, media store

pub mod address;
pub mod events;
pub mod hub;
pub mod media;
pub mod session;
pub mod testing;
pub mod traits;

pub use events::{BridgeEvent, ClientEvent, Frame, InboundMessage, RawMessage};
pub use hub::{EventHub, SubscriberId};
pub use session::{next_state, LifecycleSignal, SessionMachine, SessionState};
pub use traits::{MediaAttachment, SessionClient, SharedSessionClient};

// ABOUTME: Root library module for the WhatsApp session bridge
// ABOUTME: Wires config, shared state, the sidecar adapter, pipelines, and the control-plane server

pub mod bridge;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod inbound;
pub mod paths;
pub mod qr;
pub mod server;
pub mod shutdown;
pub mod state;

pub use bridge::EventLoop;
pub use config::Config;
pub use state::{BridgeState, Subscription};

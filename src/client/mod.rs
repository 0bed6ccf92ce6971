// ABOUTME: Concrete session client adapter backed by a driver sidecar process
// ABOUTME: The driver hosts the chat-network library; we speak NDJSON to it over stdio

pub mod protocol;
pub mod sidecar;

pub use sidecar::SidecarClient;

// ABOUTME: Outbound dispatch - validates send/typing requests, gates on READY, resolves media
// ABOUTME: Adapter failures surface verbatim to the caller; nothing is retried here

use serde::Deserialize;
use std::path::Path;
use wa_bridge_core::address::{is_valid_recipient, to_chat_id};
use wa_bridge_core::media::load_attachment;
use wa_bridge_core::SharedSessionClient;

use crate::state::BridgeState;

/// Error message for a send that names no recipient or no content.
pub const MISSING_SEND_FIELDS: &str = "Missing to or body/media_path";
/// Error message for a typing request without a recipient.
pub const MISSING_RECIPIENT: &str = "Missing to";
/// Error message for a recipient that is neither `+<digits>` nor a chat id.
pub const INVALID_RECIPIENT: &str = "Invalid recipient";
/// Error message when the session is not READY.
pub const NOT_READY: &str = "WhatsApp not ready";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed caller input; never reaches the adapter
    #[error("{0}")]
    InvalidRequest(&'static str),
    /// Session is not READY; the caller may retry later
    #[error("WhatsApp not ready")]
    NotReady,
    /// Local attachment could not be read
    #[error("{0:#}")]
    Media(anyhow::Error),
    /// The adapter rejected the call
    #[error("{0:#}")]
    Adapter(anyhow::Error),
}

/// Body of a send request. Empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub media_path: Option<String>,
}

/// Body of a typing-indicator request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypingRequest {
    #[serde(default)]
    pub to: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn check_recipient(to: &str) -> Result<(), DispatchError> {
    if is_valid_recipient(to) {
        Ok(())
    } else {
        tracing::warn!(to = %to, "Rejecting malformed recipient");
        Err(DispatchError::InvalidRequest(INVALID_RECIPIENT))
    }
}

pub struct Dispatcher {
    state: BridgeState,
    client: SharedSessionClient,
}

impl Dispatcher {
    pub fn new(state: BridgeState, client: SharedSessionClient) -> Self {
        Self { state, client }
    }

    /// Send text, or media with an optional caption.
    ///
    /// Resolves only after the adapter call does. If the session leaves READY
    /// while the call is in flight, its own outcome is reported.
    pub async fn send(&self, request: &SendRequest) -> Result<(), DispatchError> {
        let to = present(&request.to).ok_or(DispatchError::InvalidRequest(MISSING_SEND_FIELDS))?;
        // Bodies keep their whitespace; only emptiness matters.
        let body = request.body.as_deref().filter(|b| !b.is_empty());
        let media_path = present(&request.media_path);
        if body.is_none() && media_path.is_none() {
            return Err(DispatchError::InvalidRequest(MISSING_SEND_FIELDS));
        }
        check_recipient(to)?;

        if !self.state.is_ready() {
            tracing::warn!(state = %self.state.session_state(), "Send rejected: session not ready");
            return Err(DispatchError::NotReady);
        }

        let chat_id = to_chat_id(to);
        match media_path {
            Some(path) => {
                let media = load_attachment(Path::new(path))
                    .await
                    .map_err(DispatchError::Media)?;
                tracing::info!(
                    chat_id = %chat_id,
                    mime_type = %media.mime_type,
                    size = media.data.len(),
                    "Sending media"
                );
                self.client
                    .send_media(&chat_id, media, body)
                    .await
                    .map_err(DispatchError::Adapter)
            }
            None => {
                let body = body.unwrap_or_default();
                tracing::info!(chat_id = %chat_id, body_len = body.len(), "Sending text");
                self.client
                    .send_text(&chat_id, body)
                    .await
                    .map_err(DispatchError::Adapter)
            }
        }
    }

    /// Show a typing indicator in the recipient's conversation.
    pub async fn send_typing(&self, request: &TypingRequest) -> Result<(), DispatchError> {
        let to = present(&request.to).ok_or(DispatchError::InvalidRequest(MISSING_RECIPIENT))?;
        check_recipient(to)?;
        if !self.state.is_ready() {
            return Err(DispatchError::NotReady);
        }

        let chat_id = to_chat_id(to);
        tracing::debug!(chat_id = %chat_id, "Sending typing indicator");
        self.client
            .send_typing(&chat_id)
            .await
            .map_err(DispatchError::Adapter)
    }
}

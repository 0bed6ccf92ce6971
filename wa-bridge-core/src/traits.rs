// ABOUTME: Narrow adapter interface over the opaque chat-network session client
// ABOUTME: Lifecycle control, text/media sends, typing indicator, and media download

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Attachment bytes plus MIME type, either downloaded from or bound for the network.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Suggested filename, if known
    pub filename: Option<String>,
}

// Bytes are elided so attachments don't flood the logs
impl std::fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaAttachment")
            .field("len", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// The session client adapter.
///
/// Implementations wrap the chat-network client library. Lifecycle events are
/// delivered out of band through the event queue handed to the implementation
/// at construction. Every method reports failures to the caller and never
/// retries internally.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Start (or restart) the session. Lifecycle events follow on the event queue.
    async fn initialize(&self) -> Result<()>;

    /// Tear down the session, leaving the credential store consistent.
    async fn destroy(&self) -> Result<()>;

    /// Send a plain text message to a network-form chat id.
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<()>;

    /// Send an attachment with an optional caption to a network-form chat id.
    async fn send_media(
        &self,
        chat_id: &str,
        media: MediaAttachment,
        caption: Option<&str>,
    ) -> Result<()>;

    /// Show a typing indicator in the conversation.
    async fn send_typing(&self, chat_id: &str) -> Result<()>;

    /// Download the attachment carried by an inbound message.
    async fn download_media(&self, message_id: &str) -> Result<MediaAttachment>;
}

pub type SharedSessionClient = Arc<dyn SessionClient>;

// ABOUTME: Scriptable in-memory SessionClient for tests - records calls, fails on demand
// ABOUTME: Lets dispatch and pipeline logic run without a real network session
//!
//! # Example
//!
//! ```no_run
//! use wa_bridge_core::testing::{MockCall, MockSessionClient};
//! use wa_bridge_core::SessionClient;
//!
//! # async fn example() {
//! let client = MockSessionClient::new().with_media("MSG1", "image/jpeg", vec![1, 2, 3]);
//! client.send_text("15551234567@c.us", "hi").await.unwrap();
//! assert_eq!(
//!     client.calls(),
//!     vec![MockCall::SendText {
//!         chat_id: "15551234567@c.us".to_string(),
//!         body: "hi".to_string(),
//!     }]
//! );
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::traits::{MediaAttachment, SessionClient};

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Initialize,
    Destroy,
    SendText {
        chat_id: String,
        body: String,
    },
    SendMedia {
        chat_id: String,
        mime_type: String,
        data: Vec<u8>,
        caption: Option<String>,
    },
    SendTyping {
        chat_id: String,
    },
    DownloadMedia {
        message_id: String,
    },
}

#[derive(Default)]
pub struct MockSessionClient {
    calls: Mutex<Vec<MockCall>>,
    send_error: Mutex<Option<String>>,
    init_error: Mutex<Option<String>>,
    send_delay: Mutex<Option<Duration>>,
    media: Mutex<HashMap<String, MediaAttachment>>,
}

impl MockSessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `download_media(message_id)`. Unknown ids fail.
    pub fn with_media(self, message_id: &str, mime_type: &str, data: Vec<u8>) -> Self {
        self.lock_media().insert(
            message_id.to_string(),
            MediaAttachment {
                data,
                mime_type: mime_type.to_string(),
                filename: None,
            },
        );
        self
    }

    /// Make every send/typing call fail with `message`.
    pub fn with_send_error(self, message: &str) -> Self {
        self.fail_sends(Some(message));
        self
    }

    /// Make `initialize` fail with `message`.
    pub fn with_init_error(self, message: &str) -> Self {
        *self.init_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
        self
    }

    /// Hold every send/typing call for `delay` after it is recorded.
    pub fn with_send_delay(self, delay: Duration) -> Self {
        *self.send_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
        self
    }

    /// Toggle send failures after construction.
    pub fn fail_sends(&self, message: Option<&str>) {
        *self.send_error.lock().unwrap_or_else(|e| e.into_inner()) = message.map(String::from);
    }

    /// All calls seen so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Calls excluding lifecycle and download traffic.
    pub fn sends(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    MockCall::SendText { .. } | MockCall::SendMedia { .. } | MockCall::SendTyping { .. }
                )
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    async fn check_send(&self) -> Result<()> {
        let delay = *self.send_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.send_error.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(message) => anyhow::bail!("{}", message),
            None => Ok(()),
        }
    }

    fn lock_media(&self) -> std::sync::MutexGuard<'_, HashMap<String, MediaAttachment>> {
        self.media.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    async fn initialize(&self) -> Result<()> {
        self.record(MockCall::Initialize);
        match self.init_error.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(message) => anyhow::bail!("{}", message),
            None => Ok(()),
        }
    }

    async fn destroy(&self) -> Result<()> {
        self.record(MockCall::Destroy);
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<()> {
        self.record(MockCall::SendText {
            chat_id: chat_id.to_string(),
            body: body.to_string(),
        });
        self.check_send().await
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: MediaAttachment,
        caption: Option<&str>,
    ) -> Result<()> {
        self.record(MockCall::SendMedia {
            chat_id: chat_id.to_string(),
            mime_type: media.mime_type,
            data: media.data,
            caption: caption.map(String::from),
        });
        self.check_send().await
    }

    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        self.record(MockCall::SendTyping {
            chat_id: chat_id.to_string(),
        });
        self.check_send().await
    }

    async fn download_media(&self, message_id: &str) -> Result<MediaAttachment> {
        self.record(MockCall::DownloadMedia {
            message_id: message_id.to_string(),
        });
        self.lock_media()
            .get(message_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No media for message {}", message_id))
    }
}

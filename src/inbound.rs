// ABOUTME: Inbound message pipeline - self-echo suppression, media persistence, sender normalization
// ABOUTME: Turns a raw adapter message into exactly one canonical InboundMessage

use std::collections::HashSet;
use std::sync::Arc;
use wa_bridge_core::address::from_chat_id;
use wa_bridge_core::media::MediaStore;
use wa_bridge_core::{InboundMessage, RawMessage, SharedSessionClient};

/// Upper bound on remembered message ids before the set is reset
const DEDUP_CAPACITY: usize = 4096;

/// Remembers recently seen network message ids so each is emitted once.
#[derive(Debug)]
pub struct EventDeduplicator {
    seen: HashSet<String>,
    max_size: usize,
}

impl EventDeduplicator {
    pub fn new(max_size: usize) -> Self {
        Self {
            seen: HashSet::new(),
            max_size: max_size.max(1),
        }
    }

    /// Returns true the first time `id` is seen.
    pub fn check_and_mark(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.seen.len() >= self.max_size {
            self.seen.clear();
        }
        self.seen.insert(id.to_string());
        true
    }
}

pub struct InboundPipeline {
    client: SharedSessionClient,
    media: Arc<MediaStore>,
    dedup: EventDeduplicator,
}

impl InboundPipeline {
    pub fn new(client: SharedSessionClient, media: Arc<MediaStore>) -> Self {
        Self {
            client,
            media,
            dedup: EventDeduplicator::new(DEDUP_CAPACITY),
        }
    }

    /// Normalize a raw message. Returns `None` for messages sent by our own
    /// account and for ids already emitted. A failed media download is logged
    /// and the message is still delivered without `media_path`.
    pub async fn process(&mut self, raw: RawMessage) -> Option<InboundMessage> {
        if raw.from_me {
            tracing::debug!(id = %raw.id, "Skipping self-sent message");
            return None;
        }
        if !self.dedup.check_and_mark(&raw.id) {
            tracing::debug!(id = %raw.id, "Skipping duplicate message");
            return None;
        }

        let media_path = if raw.has_media {
            self.fetch_media(&raw).await
        } else {
            None
        };

        let sender = from_chat_id(&raw.from);
        tracing::info!(
            id = %raw.id,
            from = %sender,
            body_len = raw.body.len(),
            has_media = media_path.is_some(),
            "Inbound message"
        );

        Some(InboundMessage {
            id: raw.id,
            sender,
            sender_display_name: raw.notify_name.filter(|n| !n.is_empty()),
            body: raw.body,
            media_path,
            received_at: raw.timestamp,
        })
    }

    async fn fetch_media(&self, raw: &RawMessage) -> Option<String> {
        let media = match self.client.download_media(&raw.id).await {
            Ok(media) => media,
            Err(e) => {
                tracing::warn!(id = %raw.id, error = %e, "Media download failed");
                return None;
            }
        };

        match self.media.persist(&raw.from, &media).await {
            Ok(path) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                tracing::warn!(id = %raw.id, error = %e, "Failed to save media");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_first_seen_only() {
        let mut dedup = EventDeduplicator::new(10);
        assert!(dedup.check_and_mark("a"));
        assert!(!dedup.check_and_mark("a"));
        assert!(dedup.check_and_mark("b"));
    }

    #[test]
    fn test_dedup_resets_when_full() {
        let mut dedup = EventDeduplicator::new(2);
        assert!(dedup.check_and_mark("a"));
        assert!(dedup.check_and_mark("b"));
        assert!(dedup.check_and_mark("c"));
        // "a" was forgotten when the set reset
        assert!(dedup.check_and_mark("a"));
    }
}

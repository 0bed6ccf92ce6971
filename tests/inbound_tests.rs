// ABOUTME: Tests for the inbound message pipeline against a scripted session client
// ABOUTME: Self-echo suppression, media persistence and failure, sender normalization, dedup

use std::sync::Arc;
use wa_bridge::inbound::InboundPipeline;
use wa_bridge_core::media::MediaStore;
use wa_bridge_core::testing::{MockCall, MockSessionClient};
use wa_bridge_core::RawMessage;

const JPEG_BYTES: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];

fn raw(id: &str, from: &str, body: &str) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        from: from.to_string(),
        from_me: false,
        notify_name: Some("Ann".to_string()),
        body: body.to_string(),
        timestamp: 1_700_000_000,
        has_media: false,
    }
}

fn pipeline(client: Arc<MockSessionClient>, dir: &tempfile::TempDir) -> InboundPipeline {
    InboundPipeline::new(client, Arc::new(MediaStore::new(dir.path().join("media"))))
}

#[tokio::test]
async fn test_text_message_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(Arc::new(MockSessionClient::new()), &dir);

    let message = pipeline
        .process(raw("M1", "15551234567@c.us", "hello"))
        .await
        .unwrap();
    assert_eq!(message.id, "M1");
    assert_eq!(message.sender, "+15551234567");
    assert_eq!(message.sender_display_name.as_deref(), Some("Ann"));
    assert_eq!(message.body, "hello");
    assert_eq!(message.media_path, None);
    assert_eq!(message.received_at, 1_700_000_000);
}

#[tokio::test]
async fn test_group_sender_is_left_as_is() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(Arc::new(MockSessionClient::new()), &dir);

    let message = pipeline
        .process(raw("M1", "120363025@g.us", "hi all"))
        .await
        .unwrap();
    assert_eq!(message.sender, "120363025@g.us");
}

#[tokio::test]
async fn test_self_sent_message_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockSessionClient::new());
    let mut pipeline = pipeline(client.clone(), &dir);

    let mut own = raw("M1", "15551234567@c.us", "echo");
    own.from_me = true;
    own.has_media = true;
    assert!(pipeline.process(own).await.is_none());
    // No download was attempted for the echo
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_media_is_saved_with_extension_from_mime() {
    let dir = tempfile::tempdir().unwrap();
    let client =
        Arc::new(MockSessionClient::new().with_media("M1", "image/jpeg", JPEG_BYTES.to_vec()));
    let mut pipeline = pipeline(client.clone(), &dir);

    let mut message = raw("M1", "15551234567@c.us", "");
    message.has_media = true;
    let message = pipeline.process(message).await.unwrap();

    let path = std::path::PathBuf::from(message.media_path.unwrap());
    assert_eq!(path.extension().unwrap(), "jpg");
    assert!(path
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("15551234567_"));
    assert_eq!(std::fs::read(&path).unwrap(), JPEG_BYTES);
    assert_eq!(
        client.calls(),
        vec![MockCall::DownloadMedia {
            message_id: "M1".to_string()
        }]
    );
}

#[tokio::test]
async fn test_failed_download_still_delivers_message() {
    let dir = tempfile::tempdir().unwrap();
    // No media registered, so the download fails
    let mut pipeline = pipeline(Arc::new(MockSessionClient::new()), &dir);

    let mut message = raw("M1", "15551234567@c.us", "caption");
    message.has_media = true;
    let message = pipeline.process(message).await.unwrap();
    assert_eq!(message.body, "caption");
    assert_eq!(message.media_path, None);
}

#[tokio::test]
async fn test_same_sender_back_to_back_media_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockSessionClient::new()
            .with_media("M1", "audio/ogg; codecs=opus", vec![1])
            .with_media("M2", "audio/ogg; codecs=opus", vec![2]),
    );
    let mut pipeline = pipeline(client, &dir);

    let mut first = raw("M1", "15551234567@c.us", "");
    first.has_media = true;
    let mut second = raw("M2", "15551234567@c.us", "");
    second.has_media = true;

    let a = pipeline.process(first).await.unwrap().media_path.unwrap();
    let b = pipeline.process(second).await.unwrap().media_path.unwrap();
    assert_ne!(a, b);
    assert!(a.ends_with(".ogg"));
    assert_eq!(std::fs::read(&a).unwrap(), vec![1]);
    assert_eq!(std::fs::read(&b).unwrap(), vec![2]);
}

#[tokio::test]
async fn test_redelivered_message_is_emitted_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(Arc::new(MockSessionClient::new()), &dir);

    assert!(pipeline
        .process(raw("M1", "15551234567@c.us", "hi"))
        .await
        .is_some());
    assert!(pipeline
        .process(raw("M1", "15551234567@c.us", "hi"))
        .await
        .is_none());
}

#[tokio::test]
async fn test_empty_display_name_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(Arc::new(MockSessionClient::new()), &dir);

    let mut message = raw("M1", "15551234567@c.us", "hi");
    message.notify_name = Some(String::new());
    let message = pipeline.process(message).await.unwrap();
    assert_eq!(message.sender_display_name, None);
}

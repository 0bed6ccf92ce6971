// ABOUTME: Newline-delimited JSON wire format between the bridge and the driver process
// ABOUTME: Requests carry an id; the driver answers with a matching reply or emits unsolicited events

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wa_bridge_core::{ClientEvent, MediaAttachment, RawMessage};

/// Operations the bridge asks the driver to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Initialize,
    SendText {
        chat_id: String,
        body: String,
    },
    SendMedia {
        chat_id: String,
        /// Base64 (standard alphabet) attachment bytes
        data: String,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    SendTyping {
        chat_id: String,
    },
    DownloadMedia {
        message_id: String,
    },
    Destroy,
}

impl Request {
    pub fn send_media(chat_id: &str, media: &MediaAttachment, caption: Option<&str>) -> Self {
        Request::SendMedia {
            chat_id: chat_id.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(&media.data),
            mime_type: media.mime_type.clone(),
            filename: media.filename.clone(),
            caption: caption.map(str::to_string),
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Request::Initialize => "initialize",
            Request::SendText { .. } => "send_text",
            Request::SendMedia { .. } => "send_media",
            Request::SendTyping { .. } => "send_typing",
            Request::DownloadMedia { .. } => "download_media",
            Request::Destroy => "destroy",
        }
    }
}

/// A request line: `{"id": n, "op": ..., ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub request: &'a Request,
}

impl Envelope<'_> {
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to encode driver request")
    }
}

/// The driver's answer to one request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub reply: u64,
    pub ok: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    pub fn into_result(self) -> std::result::Result<Value, String> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "driver reported an unspecified error".to_string()))
        }
    }
}

/// Unsolicited events pushed by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DriverEvent {
    Qr {
        qr: String,
    },
    Authenticated,
    Ready,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Message(RawMessage),
}

impl From<DriverEvent> for ClientEvent {
    fn from(event: DriverEvent) -> Self {
        match event {
            DriverEvent::Qr { qr } => ClientEvent::Qr(qr),
            DriverEvent::Authenticated => ClientEvent::Authenticated,
            DriverEvent::Ready => ClientEvent::Ready,
            DriverEvent::AuthFailure { message } => ClientEvent::AuthFailure(message),
            DriverEvent::Disconnected { reason } => ClientEvent::Disconnected(reason),
            DriverEvent::Message(raw) => ClientEvent::Message(raw),
        }
    }
}

/// Any line the driver writes to stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverLine {
    Reply(Reply),
    Event(DriverEvent),
}

/// Parse one stdout line. Replies are recognised by their `reply` field.
pub fn parse_line(line: &str) -> Result<DriverLine> {
    let value: Value = serde_json::from_str(line).context("Driver line is not JSON")?;
    if value.get("reply").is_some() {
        let reply = serde_json::from_value(value).context("Malformed driver reply")?;
        Ok(DriverLine::Reply(reply))
    } else {
        let event = serde_json::from_value(value).context("Unknown driver event")?;
        Ok(DriverLine::Event(event))
    }
}

/// Attachment payload returned by `download_media`.
#[derive(Debug, Deserialize)]
struct MediaPayload {
    #[serde(alias = "mimetype")]
    mime_type: String,
    data: String,
    #[serde(default)]
    filename: Option<String>,
}

pub fn decode_media(data: Value) -> Result<MediaAttachment> {
    let payload: MediaPayload =
        serde_json::from_value(data).context("Driver returned a malformed media payload")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.data.as_bytes())
        .context("Driver returned media that is not valid base64")?;
    Ok(MediaAttachment {
        data: bytes,
        mime_type: payload.mime_type,
        filename: payload.filename.filter(|f| !f.is_empty()),
    })
}

// ABOUTME: Session-scoped media directory for inbound attachments, plus outbound file loading
// ABOUTME: Filenames are `<source>_<monotonic-millis>.<ext>` so concurrent writes never collide

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::traits::MediaAttachment;

/// Extension used when the MIME type is unknown.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Map a MIME type to a file extension.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    // Drop parameters such as `audio/ogg; codecs=opus`
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "video/mp4" => "mp4",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or(FALLBACK_EXTENSION),
    }
}

/// Sanitize a sender id for use as a filename prefix. The network suffix is dropped.
pub fn sanitize_source(source: &str) -> String {
    let local = source.split('@').next().unwrap_or("");
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Append-only store for inbound attachments.
#[derive(Debug)]
pub struct MediaStore {
    dir: PathBuf,
    last_stamp: Mutex<i64>,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_stamp: Mutex::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Milliseconds since epoch, strictly increasing across calls on this store.
    fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last_stamp.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = if now > *last { now } else { *last + 1 };
        *last = stamp;
        stamp
    }

    /// Build the next unique filename for an attachment from `source`.
    pub fn next_filename(&self, source: &str, mime_type: &str) -> String {
        format!(
            "{}_{}.{}",
            sanitize_source(source),
            self.next_stamp(),
            extension_for_mime(mime_type)
        )
    }

    /// Write an attachment and return its path. The file is never touched again.
    pub async fn persist(&self, source: &str, media: &MediaAttachment) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create media dir {}", self.dir.display()))?;

        let filename = self.next_filename(source, &media.mime_type);
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, &media.data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(
            filename = %filename,
            size = media.data.len(),
            mime_type = %media.mime_type,
            "Saved attachment"
        );
        Ok(path)
    }
}

/// Read a local file into an attachment, guessing its MIME type from the extension.
pub async fn load_attachment(path: &Path) -> Result<MediaAttachment> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read media file {}", path.display()))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string());

    Ok(MediaAttachment {
        data,
        mime_type,
        filename,
    })
}

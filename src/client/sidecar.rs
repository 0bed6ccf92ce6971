// ABOUTME: SessionClient implementation that drives the driver process over stdin/stdout
// ABOUTME: One writer task owns stdin; one reader task routes replies by id and forwards events

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command as ProcessCommand;
use tokio::sync::{mpsc, oneshot};
use wa_bridge_core::{ClientEvent, MediaAttachment, SessionClient};

use super::protocol::{decode_media, parse_line, DriverLine, Envelope, Request};
use crate::config::DriverConfig;

/// Disconnect reason reported when the driver's stdout closes.
pub const DRIVER_EXITED: &str = "driver exited";

/// Queued request lines waiting for the writer task
const WRITE_QUEUE: usize = 64;

type ReplySender = oneshot::Sender<std::result::Result<Value, String>>;

#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, ReplySender>,
    closed: bool,
}

/// Session client backed by a driver sidecar.
pub struct SidecarClient {
    writer: mpsc::Sender<String>,
    pending: Arc<Mutex<Pending>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl SidecarClient {
    /// Spawn the driver process and wire its stdio.
    ///
    /// Lifecycle and message events are forwarded to `events` in the order the
    /// driver emits them.
    pub fn spawn(
        config: &DriverConfig,
        session_dir: &Path,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<Self> {
        let mut cmd = ProcessCommand::new(&config.command);
        cmd.args(&config.args).arg("--session-dir").arg(session_dir);
        tracing::debug!(cmd = ?cmd, "Spawning driver");

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn driver '{}'", config.command))?;

        let stdin = child.stdin.take().context("Failed to capture stdin")?;
        let stdout = child.stdout.take().context("Failed to capture stdout")?;
        let stderr = child.stderr.take().context("Failed to capture stderr")?;

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.is_empty() {
                    tracing::warn!(stderr = %line, "Driver stderr");
                }
            }
        });

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => tracing::info!("Driver exited"),
                Ok(status) => tracing::error!(code = ?status.code(), "Driver exited with failure"),
                Err(e) => tracing::error!(error = %e, "Failed to wait for driver"),
            }
        });

        tracing::info!(
            command = %config.command,
            session_dir = %session_dir.display(),
            "Driver started"
        );
        Ok(Self::from_io(
            stdout,
            stdin,
            events,
            Duration::from_secs(config.request_timeout_secs),
        ))
    }

    /// Build a client over an arbitrary byte stream pair. `reader` carries the
    /// driver's output, `writer` its input.
    pub fn from_io<R, W>(
        reader: R,
        writer: W,
        events: mpsc::UnboundedSender<ClientEvent>,
        timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::channel(WRITE_QUEUE);
        let pending = Arc::new(Mutex::new(Pending::default()));

        tokio::spawn(write_loop(writer, writer_rx));
        tokio::spawn(read_loop(reader, pending.clone(), events));

        Self {
            writer: writer_tx,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn request(&self, request: Request) -> Result<Value> {
        let op = request.op();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = Envelope {
            id,
            request: &request,
        }
        .to_line()?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.lock_pending();
            if pending.closed {
                anyhow::bail!("{op} failed: {DRIVER_EXITED}");
            }
            pending.waiters.insert(id, tx);
        }

        tracing::debug!(id, op, "Driver request");
        if self.writer.send(line).await.is_err() {
            self.lock_pending().waiters.remove(&id);
            anyhow::bail!("{op} failed: driver input is closed");
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(message))) => Err(anyhow::anyhow!(message)),
            Ok(Err(_)) => anyhow::bail!("{op} failed: {DRIVER_EXITED}"),
            Err(_) => {
                self.lock_pending().waiters.remove(&id);
                tracing::warn!(id, op, timeout = ?self.timeout, "Driver request timed out");
                anyhow::bail!("{op} timed out after {}s", self.timeout.as_secs_f32())
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut lines: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            tracing::error!(error = %e, "Failed to write to driver");
            break;
        }
    }
}

async fn read_loop<R>(
    reader: R,
    pending: Arc<Mutex<Pending>>,
    events: mpsc::UnboundedSender<ClientEvent>,
)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read from driver");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Ok(DriverLine::Reply(reply)) => {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .waiters
                    .remove(&reply.reply);
                match waiter {
                    // The requester may have been cancelled
                    Some(tx) => {
                        let _ = tx.send(reply.into_result());
                    }
                    None => tracing::debug!(id = reply.reply, "Reply for unknown request"),
                }
            }
            Ok(DriverLine::Event(event)) => {
                // Unbounded so a reply is never stuck behind a queued event
                if events.send(event.into()).is_err() {
                    tracing::debug!("Event receiver closed, stopping driver reader");
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, line = %line, "Ignoring unparseable driver line"),
        }
    }

    // Dropping the waiters fails every in-flight request
    {
        let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.closed = true;
        pending.waiters.clear();
    }
    let _ = events.send(ClientEvent::Disconnected(DRIVER_EXITED.to_string()));
}

#[async_trait]
impl SessionClient for SidecarClient {
    async fn initialize(&self) -> Result<()> {
        self.request(Request::Initialize).await.map(|_| ())
    }

    async fn destroy(&self) -> Result<()> {
        self.request(Request::Destroy).await.map(|_| ())
    }

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<()> {
        self.request(Request::SendText {
            chat_id: chat_id.to_string(),
            body: body.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: MediaAttachment,
        caption: Option<&str>,
    ) -> Result<()> {
        self.request(Request::send_media(chat_id, &media, caption))
            .await
            .map(|_| ())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        self.request(Request::SendTyping {
            chat_id: chat_id.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn download_media(&self, message_id: &str) -> Result<MediaAttachment> {
        let data = self
            .request(Request::DownloadMedia {
                message_id: message_id.to_string(),
            })
            .await?;
        decode_media(data)
    }
}

//! Append-only access log.
//!
//! # Responsibilities
//! - Define the per-request record written once per inbound request
//! - Serialize records as one JSON object per line
//! - Write to a file (append mode) or stdout
//!
//! # Design Decisions
//! - `emit` never blocks: records go through an unbounded channel
//! - A single writer task owns the sink, so lines never interleave
//! - The writer drains and flushes once every sender is dropped

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One line of the access log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub trace_id: String,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: f64,
    pub client_ip: Option<String>,
    pub user_id: Option<String>,
    /// Service the request was routed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Transport failure detail, never shown to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handle used by request tasks to emit records.
#[derive(Debug, Clone)]
pub struct AccessLog {
    tx: mpsc::UnboundedSender<AccessRecord>,
}

/// The background task draining an [`AccessLog`].
#[derive(Debug)]
pub struct AccessLogWriter {
    handle: JoinHandle<io::Result<()>>,
}

impl AccessLog {
    /// A log whose records are delivered to the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AccessRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A log written as JSON lines to `writer` by a background task.
    pub fn with_writer<W>(writer: W) -> (Self, AccessLogWriter)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (log, rx) = Self::channel();
        let handle = tokio::spawn(write_records(rx, writer));
        (log, AccessLogWriter { handle })
    }

    /// Open the configured sink: `path` in append mode, or stdout.
    pub async fn open(path: Option<&Path>) -> io::Result<(Self, AccessLogWriter)> {
        match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                tracing::info!(path = %path.display(), "Access log opened");
                Ok(Self::with_writer(file))
            }
            None => Ok(Self::with_writer(tokio::io::stdout())),
        }
    }

    /// Queue a record. Never blocks the caller.
    pub fn emit(&self, record: AccessRecord) {
        if let Err(mpsc::error::SendError(record)) = self.tx.send(record) {
            tracing::warn!(
                trace_id = %record.trace_id,
                method = %record.method,
                path = %record.path,
                status = record.status,
                "Access log closed, record dropped"
            );
        }
    }
}

impl AccessLogWriter {
    /// Wait for the writer to drain. Completes once every [`AccessLog`] clone is dropped.
    pub async fn finish(self) -> io::Result<()> {
        self.handle.await.map_err(io::Error::other)?
    }
}

async fn write_records<W>(mut rx: mpsc::UnboundedReceiver<AccessRecord>, writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    while let Some(record) = rx.recv().await {
        write_line(&mut writer, &record).await?;
        // Batch whatever queued up meanwhile, then flush once.
        while let Ok(record) = rx.try_recv() {
            write_line(&mut writer, &record).await?;
        }
        writer.flush().await?;
    }

    writer.flush().await
}

async fn write_line<W>(writer: &mut BufWriter<W>, record: &AccessRecord) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await
}

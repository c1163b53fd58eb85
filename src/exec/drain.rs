// src/exec/drain.rs

//! Continuous draining of child output.
//!
//! A child that writes more than the OS pipe buffer (tens of KB) before its
//! parent reads will block forever, and a parent that waits for the child
//! before reading deadlocks with it. Each pipe therefore gets its own Tokio
//! task that copies bytes as soon as they arrive, for the whole life of the
//! process:
//!
//! - file destinations receive the raw bytes through a buffered writer that
//!   is flushed at end-of-stream;
//! - log destinations receive one sink line per output line, at debug level,
//!   with lines over [`MAX_LINE_BYTES`] split into pieces.
//!
//! Destination errors are reported through the sink and never stop the
//! reading side, so the child keeps making progress.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::task::JoinHandle;
use tracing::{Level, debug};

use crate::errors::ShellExecError;
use crate::sink::LogSink;

/// How long a drain may keep running after its process ended.
///
/// Normally the pipe reaches end-of-stream immediately; it stays open only if
/// something the shell forked still holds it.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

const CHUNK_SIZE: usize = 8 * 1024;

/// Longest line a log drain buffers; longer lines are logged in pieces.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Which standard stream a drain is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Where drained bytes end up.
#[derive(Debug)]
pub enum Destination {
    /// An already-created file; bytes are copied verbatim.
    File(File),
    /// The host log sink, line by line at debug level.
    Log,
}

impl From<Option<File>> for Destination {
    fn from(file: Option<File>) -> Self {
        file.map_or(Destination::Log, Destination::File)
    }
}

/// Everything a drain task needs to report what it copies.
struct DrainContext {
    command: Arc<str>,
    stream: StreamKind,
    sink: Arc<dyn LogSink>,
}

impl DrainContext {
    fn report(&self, source: std::io::Error) {
        let err = ShellExecError::Drain {
            command: self.command.to_string(),
            stream: self.stream,
            source,
        };
        self.sink.log(Level::WARN, &err.to_string());
    }
}

/// Handle to one running drain task.
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct OutputDrain {
    stream: StreamKind,
    handle: JoinHandle<()>,
}

impl OutputDrain {
    /// Start copying `reader` into `destination`.
    pub fn spawn<R>(
        reader: R,
        stream: StreamKind,
        destination: Destination,
        command: Arc<str>,
        sink: Arc<dyn LogSink>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let ctx = DrainContext {
            command,
            stream,
            sink,
        };

        let handle = tokio::spawn(async move {
            match destination {
                Destination::File(file) => drain_to_file(reader, file, &ctx).await,
                Destination::Log => drain_to_log(reader, &ctx).await,
            }
            debug!(command = %ctx.command, stream = %ctx.stream, "drain reached end of stream");
        });

        Self { stream, handle }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Wait up to `grace` for end-of-stream, then abort.
    pub async fn finish(mut self, grace: Duration) {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(stream = %self.stream, error = %e, "drain task ended abnormally"),
            Err(_) => {
                debug!(
                    stream = %self.stream,
                    "pipe still held open after process exit; abandoning drain"
                );
                self.handle.abort();
            }
        }
    }
}

impl Drop for OutputDrain {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn drain_to_file<R>(mut reader: R, file: File, ctx: &DrainContext)
where
    R: AsyncRead + Unpin,
{
    let mut writer = Some(BufWriter::new(file));
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                ctx.report(e);
                break;
            }
        };

        // After a write error keep reading and discard, so the child never
        // blocks on a full pipe.
        if let Some(w) = writer.as_mut() {
            if let Err(e) = w.write_all(&buf[..n]).await {
                ctx.report(e);
                writer = None;
            }
        }
    }

    if let Some(mut w) = writer {
        if let Err(e) = w.flush().await {
            ctx.report(e);
        }
    }
}

async fn drain_to_log<R>(reader: R, ctx: &DrainContext)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
        match limited.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\n', '\r']);
                ctx.sink.log(
                    Level::DEBUG,
                    &format!("{} of '{}': {}", ctx.stream, ctx.command, text),
                );
            }
            Err(e) => {
                ctx.report(e);
                break;
            }
        }
    }
}

// src/sink.rs

//! Host-facing log sink.
//!
//! Every status line a task emits ("Task is not finished yet: ...", "Task was
//! finished with exit code ...") and every line of captured output goes
//! through a [`LogSink`]. Operators grep for those lines, so they are routed
//! through one seam instead of scattered `tracing` calls; the engine's own
//! diagnostics still use `tracing` directly.

use std::fmt;

use tracing::Level;

/// Destination for task status lines and captured output.
///
/// Implementations must not block: drains call `log` for every output line.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl fmt::Debug for dyn LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

/// Production sink: forwards every line to `tracing` under the
/// `shellexec::task` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "shellexec::task", "{message}"),
            Level::WARN => tracing::warn!(target: "shellexec::task", "{message}"),
            Level::INFO => tracing::info!(target: "shellexec::task", "{message}"),
            Level::DEBUG => tracing::debug!(target: "shellexec::task", "{message}"),
            _ => tracing::trace!(target: "shellexec::task", "{message}"),
        }
    }
}

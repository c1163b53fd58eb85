use std::sync::{Arc, Mutex};

use shellexec::sink::LogSink;
use tracing::Level;

/// A sink that keeps every line it receives, for asserting on the exact
/// status messages a host would see.
///
/// Lines are also forwarded to `tracing`, so `RUST_LOG=debug` shows them in
/// failing tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines in arrival order.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }

    /// Lines recorded at exactly `level`.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Lines at `level` joined with newlines, like a captured log buffer.
    pub fn buffer(&self, level: Level) -> String {
        self.at(level).join("\n")
    }

    /// How many lines at `level` contain `needle`.
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.at(level).iter().filter(|m| m.contains(needle)).count()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.count(level, needle) > 0
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: Level, message: &str) {
        tracing::debug!(target: "recording_sink", %level, "{message}");
        self.lines.lock().unwrap().push((level, message.to_string()));
    }
}

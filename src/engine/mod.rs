// src/engine/mod.rs

//! Lifecycle orchestration.
//!
//! - [`stage`]: `TaskSet`, the ordered tasks of one stage and how they run.
//! - [`registry`]: background tasks shared across stages.
//! - [`policy`]: exit code → stage result.
//! - [`executor`]: `ShellExecutor`, the five lifecycle entry points.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::sink::{LogSink, TracingSink};

pub mod executor;
pub mod policy;
pub mod registry;
pub mod stage;

pub use executor::ShellExecutor;
pub use registry::{TaskRegistry, TaskSnapshot};
pub use stage::TaskSet;

/// Check interval used when the host does not configure one.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// What the engine needs from its host.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Base working directory for every task.
    pub cwd: PathBuf,
    /// Variables applied over the inherited process environment.
    pub env: BTreeMap<String, String>,
    /// Receiver of status lines and captured output.
    pub sink: Arc<dyn LogSink>,
    /// How often the host intends to call `check()`.
    pub check_interval: Duration,
}

impl HostContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: BTreeMap::new(),
            sink: Arc::new(TracingSink),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }
}

// src/exec/spec.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Immutable description of one command to run, as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Command line, interpreted by the platform shell.
    pub command: String,

    /// Start the task and leave it running past its stage.
    pub background: bool,

    /// A non-zero exit is logged instead of raised.
    pub ignore_failure: bool,

    /// File receiving stdout; `None` routes stdout to the log sink.
    pub stdout_target: Option<PathBuf>,

    /// File receiving stderr; `None` routes stderr to the log sink.
    pub stderr_target: Option<PathBuf>,

    /// Extra variables merged over the host's base environment.
    pub env: BTreeMap<String, String>,

    /// Working directory override; relative paths resolve against the
    /// host's base directory.
    pub working_dir: Option<PathBuf>,
}

impl TaskSpec {
    /// A blocking, failure-sensitive task whose output goes to the log.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            background: false,
            ignore_failure: false,
            stdout_target: None,
            stderr_target: None,
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// Directory the process runs in, given the host's base directory.
    pub fn resolve_working_dir(&self, base_cwd: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) => base_cwd.join(dir),
            None => base_cwd.to_path_buf(),
        }
    }
}

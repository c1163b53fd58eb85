// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The process-level variants carry the offending command text so that a
//! fatal error is self-describing once it reaches the host.

use thiserror::Error;

use crate::exec::StreamKind;

#[derive(Error, Debug)]
pub enum ShellExecError {
    /// The shell could not be launched, or an output target could not be
    /// created. Always fatal.
    #[error("Failed to start task '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and returned a failing exit code.
    #[error("Task failed with exit code {code}: {command}")]
    NonZeroExit { command: String, code: i32 },

    /// Copying a child's output to its destination failed. Only ever logged.
    #[error("Failed to drain {stream} of task '{command}': {source}")]
    Drain {
        command: String,
        stream: StreamKind,
        #[source]
        source: std::io::Error,
    },

    /// A background task was still alive at a teardown checkpoint.
    #[error("Background task was not completed, shutting it down: {command}")]
    StillRunningAtTeardown { command: String },

    #[error("Task was already started: {0}")]
    AlreadyStarted(String),

    #[error("Task was never started: {0}")]
    NotStarted(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShellExecError {
    /// Whether the host must treat this error as fatal.
    ///
    /// Drain failures and teardown notices are reported through the sink and
    /// never abort a stage.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ShellExecError::Drain { .. } | ShellExecError::StillRunningAtTeardown { .. }
        )
    }

    /// Exit code carried by a `NonZeroExit` error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellExecError::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellExecError>;

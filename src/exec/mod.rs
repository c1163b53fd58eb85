// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`spec`] holds the immutable `TaskSpec` a host hands in.
//! - [`process`] builds platform shell commands and terminates process
//!   groups.
//! - [`drain`] keeps child pipes empty by copying stdout/stderr to a file or
//!   the log sink while the process runs.
//! - [`task`] owns one child process, its drains and its state machine.

pub mod drain;
pub mod process;
pub mod spec;
pub mod task;

pub use drain::{Destination, OutputDrain, StreamKind};
pub use spec::TaskSpec;
pub use task::{Task, TaskOrigin, TaskState};

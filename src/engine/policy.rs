// src/engine/policy.rs

//! Failure policy applied to finished tasks.

use tracing::Level;

use crate::errors::{Result, ShellExecError};
use crate::exec::{Task, TaskState};

/// Turn a task's outcome into a stage result.
///
/// - exit code 0, still running, or killed by the engine: `Ok`.
/// - non-zero with `ignore_failure`: logged at info, `Ok`.
/// - non-zero otherwise: `NonZeroExit`.
///
/// A failure is surfaced at most once; later checkpoints see `Ok`.
pub fn apply_failure_policy(task: &mut Task) -> Result<()> {
    let TaskState::Finished(code) = task.state() else {
        return Ok(());
    };
    if code == 0 || !task.mark_failure_surfaced() {
        return Ok(());
    }

    if task.spec().ignore_failure {
        task.sink().log(
            Level::INFO,
            &format!(
                "Ignoring failure of task with exit code {code}: {}",
                task.command()
            ),
        );
        return Ok(());
    }

    Err(ShellExecError::NonZeroExit {
        command: task.command().to_string(),
        code,
    })
}

/// Apply the policy to every task, returning the first failure.
///
/// Later failures are logged at error level so none goes unreported.
pub fn apply_to_all<'a>(tasks: impl IntoIterator<Item = &'a mut Task>) -> Result<()> {
    let mut first = None;

    for task in tasks {
        if let Err(err) = apply_failure_policy(task) {
            if first.is_none() {
                first = Some(err);
            } else {
                task.sink().log(Level::ERROR, &err.to_string());
            }
        }
    }

    first.map_or(Ok(()), Err)
}

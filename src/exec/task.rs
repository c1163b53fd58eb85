// src/exec/task.rs

//! One spawned child process and its completion state.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::process::Child;
use tracing::{Level, debug, info, warn};

use crate::errors::{Result, ShellExecError};
use crate::exec::drain::{DRAIN_GRACE, Destination, OutputDrain, StreamKind};
use crate::exec::process::{self, exit_code};
use crate::exec::spec::TaskSpec;
use crate::sink::LogSink;
use crate::types::Stage;

/// Time a killed process group gets between SIGTERM and SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of a task.
///
/// `Finished` and `Killed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    Running,
    Finished(i32),
    Killed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished(_) | TaskState::Killed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::NotStarted => f.write_str("not started"),
            TaskState::Running => f.write_str("running"),
            TaskState::Finished(code) => write!(f, "finished ({code})"),
            TaskState::Killed => f.write_str("killed"),
        }
    }
}

/// Where a task was declared: its stage and position in that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskOrigin {
    pub stage: Stage,
    pub index: usize,
}

/// Process handle plus the drains attached to its pipes.
///
/// Exists only while the task is `Running`. Dropping it while the child is
/// alive kills the child's process group.
struct RunningProcess {
    child: Child,
    drains: Vec<OutputDrain>,
}

impl RunningProcess {
    /// Let the drains reach end-of-stream, bounded by [`DRAIN_GRACE`].
    async fn release(mut self) {
        for drain in self.drains.drain(..) {
            drain.finish(DRAIN_GRACE).await;
        }
    }
}

impl Drop for RunningProcess {
    fn drop(&mut self) {
        if self.child.id().is_some() {
            process::kill_now(&mut self.child);
        }
    }
}

/// A single command execution.
///
/// Only the control task mutates a `Task`; the drains it owns write to their
/// own destinations and never touch its state.
pub struct Task {
    spec: TaskSpec,
    origin: TaskOrigin,
    sink: Arc<dyn LogSink>,
    state: TaskState,
    started_at: Option<Instant>,
    process: Option<RunningProcess>,
    failure_surfaced: bool,
    stop_requested: bool,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("command", &self.spec.command)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(spec: TaskSpec, origin: TaskOrigin, sink: Arc<dyn LogSink>) -> Self {
        Self {
            spec,
            origin,
            sink,
            state: TaskState::NotStarted,
            started_at: None,
            process: None,
            failure_surfaced: false,
            stop_requested: false,
        }
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub fn command(&self) -> &str {
        &self.spec.command
    }

    pub fn origin(&self) -> TaskOrigin {
        self.origin
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub(crate) fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Spawn the command under the platform shell.
    ///
    /// Output targets are created before the process exists, and both drains
    /// are attached before this returns, so no byte the child writes is lost.
    pub fn start(&mut self, base_env: &BTreeMap<String, String>, base_cwd: &Path) -> Result<()> {
        if self.state != TaskState::NotStarted {
            return Err(ShellExecError::AlreadyStarted(self.spec.command.clone()));
        }

        let cwd = self.spec.resolve_working_dir(base_cwd);
        let (stdout_file, stderr_file) = self.open_targets(&cwd)?;

        let mut cmd = process::shell_command(&self.spec.command);
        cmd.current_dir(&cwd)
            .envs(base_env)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| self.spawn_error(source))?;

        let command: Arc<str> = Arc::from(self.spec.command.as_str());
        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(OutputDrain::spawn(
                stdout,
                StreamKind::Stdout,
                Destination::from(stdout_file),
                Arc::clone(&command),
                Arc::clone(&self.sink),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(OutputDrain::spawn(
                stderr,
                StreamKind::Stderr,
                Destination::from(stderr_file),
                Arc::clone(&command),
                Arc::clone(&self.sink),
            ));
        }

        debug!(
            command = %self.spec.command,
            stage = %self.origin.stage,
            pid = child.id(),
            cwd = %cwd.display(),
            background = self.spec.background,
            "task process started"
        );

        self.process = Some(RunningProcess { child, drains });
        self.started_at = Some(Instant::now());
        self.state = TaskState::Running;
        Ok(())
    }

    /// Check, without waiting on the process, whether it has exited.
    ///
    /// A still-running task logs "Task is not finished yet"; a task seen
    /// exiting moves to `Finished` and logs its exit code once.
    pub async fn poll(&mut self) -> Result<TaskState> {
        if self.is_running() && !self.refresh().await? {
            self.sink.log(
                Level::DEBUG,
                &format!("Task is not finished yet: {}", self.spec.command),
            );
        }
        Ok(self.state)
    }

    /// Record the exit of a process that already ended, without logging
    /// anything for a process that is still alive.
    ///
    /// Returns whether the task is in a terminal state afterwards.
    pub async fn refresh(&mut self) -> Result<bool> {
        let Some(running) = self.process.as_mut() else {
            return Ok(self.state.is_terminal());
        };

        if let Some(status) = running.child.try_wait()? {
            self.finish(exit_code(status)).await;
        }
        Ok(self.state.is_terminal())
    }

    /// Wait until the process exits.
    pub async fn await_completion(&mut self) -> Result<TaskState> {
        let Some(running) = self.process.as_mut() else {
            return match self.state {
                TaskState::NotStarted => Err(ShellExecError::NotStarted(self.spec.command.clone())),
                state => Ok(state),
            };
        };

        let status = running.child.wait().await?;
        self.finish(exit_code(status)).await;
        Ok(self.state)
    }

    /// Forcibly terminate a running process, allowing it [`KILL_GRACE`] to
    /// exit after SIGTERM.
    ///
    /// A process that already exited on its own is recorded as `Finished`
    /// instead.
    pub async fn kill(&mut self) -> Result<TaskState> {
        self.kill_within(KILL_GRACE).await
    }

    /// Send the stop signal without waiting for the process.
    ///
    /// From here on the task ends `Killed`, however the process exits. Used
    /// to stop many tasks at once before reaping them with [`Task::kill_within`].
    pub fn request_stop(&mut self) {
        let Some(running) = self.process.as_mut() else {
            return;
        };
        self.stop_requested = true;
        if let Err(e) = process::request_stop(&mut running.child) {
            warn!(command = %self.spec.command, error = %e, "failed to signal task process");
        }
    }

    /// Like [`Task::kill`], with an explicit grace before SIGKILL.
    pub async fn kill_within(&mut self, grace: Duration) -> Result<TaskState> {
        if self.refresh().await? {
            return Ok(self.state);
        }
        let Some(running) = self.process.as_mut() else {
            return Ok(self.state);
        };
        self.stop_requested = true;

        let status = match process::terminate(&mut running.child, grace).await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(command = %self.spec.command, error = %e, "failed to terminate task process");
                None
            }
        };

        if let Some(running) = self.process.take() {
            running.release().await;
        }
        self.state = TaskState::Killed;

        info!(
            command = %self.spec.command,
            exit_status = ?status,
            elapsed = ?self.started_at.map(|t| t.elapsed()),
            "task process killed"
        );
        Ok(self.state)
    }

    /// Whether nothing about this task is left to observe or report: it
    /// ended cleanly, was killed, or its failure was ignored or already
    /// surfaced.
    pub fn is_settled(&self) -> bool {
        match self.state {
            TaskState::NotStarted | TaskState::Running => false,
            TaskState::Killed | TaskState::Finished(0) => true,
            TaskState::Finished(_) => self.spec.ignore_failure || self.failure_surfaced,
        }
    }

    /// Record that this task's failure has been reported to the host.
    ///
    /// Returns `false` if it already was.
    pub(crate) fn mark_failure_surfaced(&mut self) -> bool {
        !std::mem::replace(&mut self.failure_surfaced, true)
    }

    async fn finish(&mut self, code: i32) {
        if let Some(running) = self.process.take() {
            running.release().await;
        }
        if self.stop_requested {
            self.state = TaskState::Killed;
            debug!(command = %self.spec.command, code, "stopped task process exited");
            return;
        }
        self.state = TaskState::Finished(code);
        self.sink.log(
            Level::DEBUG,
            &format!("Task was finished with exit code {code}: {}", self.spec.command),
        );
    }

    /// Create the stdout and stderr target files.
    ///
    /// When both streams name the same file it is truncated once and the two
    /// drains share one open file description, so their writes advance a
    /// common offset instead of overwriting each other.
    fn open_targets(&self, cwd: &Path) -> Result<(Option<File>, Option<File>)> {
        let stdout_path = self.spec.stdout_target.as_deref().map(|t| cwd.join(t));
        let stderr_path = self.spec.stderr_target.as_deref().map(|t| cwd.join(t));

        let stdout_file = stdout_path
            .as_deref()
            .map(|path| self.create_target(path))
            .transpose()?;

        let stderr_file = match (&stdout_file, stderr_path.as_deref()) {
            (_, None) => None,
            (Some(shared), Some(path)) if stdout_path.as_deref() == Some(path) => {
                Some(shared.try_clone().map_err(|source| self.spawn_error(source))?)
            }
            (_, Some(path)) => Some(self.create_target(path)?),
        };

        Ok((
            stdout_file.map(File::from_std),
            stderr_file.map(File::from_std),
        ))
    }

    fn create_target(&self, path: &Path) -> Result<std::fs::File> {
        let create = || -> std::io::Result<std::fs::File> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path)
        };
        create().map_err(|source| self.spawn_error(source))
    }

    fn spawn_error(&self, source: std::io::Error) -> ShellExecError {
        ShellExecError::Spawn {
            command: self.spec.command.clone(),
            source,
        }
    }
}

// tests/task_lifecycle.rs
#![cfg(unix)]

mod common;
use crate::common::builders::TaskSpecBuilder;
use crate::common::{RecordingSink, init_tracing, star_file, with_timeout};

use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;
use tracing::Level;

use shellexec::errors::ShellExecError;
use shellexec::exec::{Task, TaskOrigin, TaskSpec, TaskState};
use shellexec::types::Stage;

type TestResult = Result<(), Box<dyn Error>>;

fn task(spec: TaskSpec, sink: &RecordingSink) -> Task {
    let origin = TaskOrigin {
        stage: Stage::Prepare,
        index: 0,
    };
    Task::new(spec, origin, Arc::new(sink.clone()))
}

fn start(task: &mut Task, cwd: &Path) -> Result<(), ShellExecError> {
    task.start(&BTreeMap::new(), cwd)
}

#[tokio::test]
async fn awaiting_an_unstarted_task_is_an_error() -> TestResult {
    init_tracing();
    let sink = RecordingSink::new();
    let mut task = task(TaskSpec::new("true"), &sink);

    assert_eq!(task.state(), TaskState::NotStarted);
    assert!(matches!(
        task.await_completion().await,
        Err(ShellExecError::NotStarted(_))
    ));
    Ok(())
}

/// A task can be started once.
#[tokio::test]
async fn starting_twice_is_rejected() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    let mut task = task(TaskSpec::new("exit 3"), &sink);

    start(&mut task, dir.path())?;
    assert!(task.is_running());
    assert!(task.started_at().is_some());

    let state = with_timeout(task.await_completion()).await?;
    assert_eq!(state, TaskState::Finished(3));

    assert!(matches!(
        start(&mut task, dir.path()),
        Err(ShellExecError::AlreadyStarted(_))
    ));
    Ok(())
}

/// Once finished, further polls, waits and kills leave the state alone and
/// never repeat the exit-code line.
#[tokio::test]
async fn finished_task_is_stable() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    let mut task = task(TaskSpec::new("exit 2"), &sink);

    start(&mut task, dir.path())?;
    with_timeout(task.await_completion()).await?;

    assert_eq!(task.poll().await?, TaskState::Finished(2));
    assert_eq!(task.await_completion().await?, TaskState::Finished(2));
    assert_eq!(task.kill().await?, TaskState::Finished(2));

    assert_eq!(
        sink.count(Level::DEBUG, "Task was finished with exit code 2: exit 2"),
        1
    );
    assert_eq!(sink.count(Level::DEBUG, "Task is not finished yet"), 0);
    Ok(())
}

/// Killing a running task ends in `Killed`, not `Finished`.
#[tokio::test]
async fn kill_running_task() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    let mut task = task(TaskSpec::new("sleep 30"), &sink);

    start(&mut task, dir.path())?;
    assert_eq!(task.poll().await?, TaskState::Running);
    assert!(sink.contains(Level::DEBUG, "Task is not finished yet: sleep 30"));

    assert_eq!(with_timeout(task.kill()).await?, TaskState::Killed);
    assert!(task.state().is_terminal());
    assert!(!sink.contains(Level::DEBUG, "Task was finished"));
    Ok(())
}

/// A shell that dies by a signal reports the negated signal number.
#[tokio::test]
async fn signal_death_reports_negative_code() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    let mut task = task(TaskSpec::new("kill -TERM $$"), &sink);

    start(&mut task, dir.path())?;
    let state = with_timeout(task.await_completion()).await?;

    assert_eq!(state, TaskState::Finished(-15));
    Ok(())
}

/// Stdout and stderr targets receive the raw bytes; parent directories are
/// created and paths resolve against the task's working directory.
#[tokio::test]
async fn output_targets_receive_raw_bytes() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    let (input, content) = star_file(dir.path(), "input.txt", 100_000);

    let spec = TaskSpecBuilder::new(&format!("cat {}; printf 'e1\\ne2' >&2", input.display()))
        .out("logs/nested/out.txt")
        .err("logs/err.txt")
        .build();
    let mut task = task(spec, &sink);

    start(&mut task, dir.path())?;
    assert_eq!(
        with_timeout(task.await_completion()).await?,
        TaskState::Finished(0)
    );

    assert_eq!(
        std::fs::read_to_string(dir.path().join("logs/nested/out.txt"))?,
        content
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("logs/err.txt"))?,
        "e1\ne2"
    );
    assert!(!sink.contains(Level::DEBUG, "stdout of"));
    assert!(!sink.contains(Level::DEBUG, "stderr of"));
    Ok(())
}

/// An output target that cannot be created prevents the launch.
#[tokio::test]
async fn unwritable_target_is_a_spawn_error() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    std::fs::write(dir.path().join("blocker"), "")?;
    let sink = RecordingSink::new();

    let spec = TaskSpecBuilder::new("echo hi").out("blocker/out.txt").build();
    let mut task = task(spec, &sink);

    assert!(matches!(
        start(&mut task, dir.path()),
        Err(ShellExecError::Spawn { .. })
    ));
    assert_eq!(task.state(), TaskState::NotStarted);
    Ok(())
}

/// A write failure on the target is logged as a warning and does not change
/// the task's exit code.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn drain_write_failure_is_only_warned() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();

    let spec = TaskSpecBuilder::new("head -c 100000 /dev/zero")
        .out("/dev/full")
        .build();
    let mut task = task(spec, &sink);

    start(&mut task, dir.path())?;
    assert_eq!(
        with_timeout(task.await_completion()).await?,
        TaskState::Finished(0)
    );
    assert!(sink.contains(Level::WARN, "head -c 100000 /dev/zero"));
    Ok(())
}

/// Stdout and stderr naming the same file both land in it; neither stream
/// overwrites the other.
#[tokio::test]
async fn shared_output_file_keeps_both_streams() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    std::fs::write(dir.path().join("log.txt"), "stale content from an earlier run\n")?;

    let spec = TaskSpecBuilder::new("printf 'OUT-LINE-ONE\\n'; sleep 0.2; printf 'ERR\\n' >&2")
        .out("log.txt")
        .err("log.txt")
        .build();
    let mut task = task(spec, &sink);

    start(&mut task, dir.path())?;
    assert_eq!(
        with_timeout(task.await_completion()).await?,
        TaskState::Finished(0)
    );

    let content = std::fs::read_to_string(dir.path().join("log.txt"))?;
    assert!(content.contains("OUT-LINE-ONE\n"), "content was: {content:?}");
    assert!(content.contains("ERR\n"), "content was: {content:?}");
    assert_eq!(content.len(), "OUT-LINE-ONE\nERR\n".len());
    Ok(())
}

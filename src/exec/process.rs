// src/exec/process.rs

//! Platform glue for spawning and terminating shell commands.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};

/// Build a shell command appropriate for the platform.
///
/// On Unix the child leads its own process group so that [`terminate`] also
/// reaches anything the shell forked (`sleep 10 && echo done`).
pub fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        #[cfg(unix)]
        c.process_group(0);
        c
    }
}

/// Exit code reported for a finished process.
///
/// A Unix process killed by a signal reports `-<signal>`; anything else
/// without a code reports `-1`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

/// Ask a child to stop without waiting for it.
///
/// Unix: SIGTERM to the process group. Elsewhere the child is killed
/// outright.
pub fn request_stop(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        if signal_group(child, libc::SIGTERM) {
            return Ok(());
        }
    }
    child.start_kill()
}

/// Terminate a child and reap it.
///
/// The child is asked to stop, then killed once `grace` runs out.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    request_stop(child)?;
    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status;
    }

    tracing::debug!(pid = child.id(), "process ignored the stop request; killing it");
    kill_now(child);
    child.wait().await
}

/// Last-resort kill used when a still-running process is dropped.
pub fn kill_now(child: &mut Child) {
    #[cfg(unix)]
    {
        if signal_group(child, libc::SIGKILL) {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // The child was spawned with process_group(0), so its pid is the group id.
    // `id()` is `None` once the child is reaped, so the group cannot be reused.
    unsafe { libc::killpg(pid as libc::pid_t, signal) == 0 }
}

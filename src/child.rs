//! Child launcher (spec §4.D): spawns the compiled artifact under CPU-time
//! and address-space limits, merging its stdout/stderr onto one pipe and
//! making it a session leader so the whole process group can be killed.
//!
//! Grounded in the teacher's `shell/pty.rs::spawn_shell_pty` — the same
//! `pre_exec` idiom (async-signal-safe syscalls only), adapted from a PTY
//! slave to a pair of plain pipes.

use std::process::Stdio;

use nix::unistd::{access, AccessFlags};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::workspace::Workspace;

/// Resource limits for one child (spec §3 "Session").
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
}

/// Everything that can go wrong launching the child — all map to the
/// Infrastructure error kind (spec §7), exit_code -1.
#[derive(Debug)]
pub enum LaunchError {
    NotExecutable,
    Spawn(std::io::Error),
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotExecutable => write!(f, "program is not executable"),
            Self::Spawn(e) => write!(f, "failed to spawn program: {e}"),
        }
    }
}

impl std::error::Error for LaunchError {}

/// Spawn the workspace's `program` artifact as a session leader with
/// `RLIMIT_CPU`/`RLIMIT_AS` installed and stdout+stderr merged onto a single
/// pipe. stdin is piped for interactive input.
pub fn spawn(workspace: &Workspace, limits: Limits) -> Result<Child, LaunchError> {
    let artifact = workspace.artifact_path();

    if access(&artifact, AccessFlags::X_OK).is_err() {
        return Err(LaunchError::NotExecutable);
    }

    debug!(path = %artifact.display(), ?limits, "spawning child");

    let mut cmd = Command::new("./program");
    cmd.current_dir(workspace.path())
        .kill_on_drop(true)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    // SAFETY: setrlimit, chdir, setsid, and dup2 are all async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            let cpu_limit = libc::rlimit {
                rlim_cur: limits.time_limit_sec,
                rlim_max: limits.time_limit_sec,
            };
            if libc::setrlimit(libc::RLIMIT_CPU, &cpu_limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            let as_limit = libc::rlimit {
                rlim_cur: limits.memory_limit_mb * 1024 * 1024,
                rlim_max: limits.memory_limit_mb * 1024 * 1024,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &as_limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }

            // Merge stderr onto the stdout pipe tokio already wired to fd 1.
            if libc::dup2(1, 2) == -1 {
                return Err(std::io::Error::last_os_error());
            }

            Ok(())
        });
    }

    cmd.spawn().map_err(LaunchError::Spawn)
}

/// Send `SIGKILL` to the child's process group (negative pid). Relies on the
/// child having called `setsid()` before exec, which makes its pgid equal
/// its pid.
pub fn kill_process_group(pid: u32) {
    // SAFETY: kill(2) with a negative pid signals the whole process group.
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

/// Translate a [`std::process::ExitStatus`] into the `WEXITSTATUS`-style
/// code spec §4.H expects: the exit code if the child exited normally, or
/// `-1` if it was killed by a signal.
#[must_use]
pub fn exit_status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Result of running a single shell command.
///
/// Unlike most of this crate's error types, a failing command is not an
/// error — it's ordinary data. `ok` is `true` iff `exit_code == 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    fn success(exit_code: i32, stdout: String, stderr: String) -> Self {
        CommandResult {
            ok: exit_code == 0,
            stdout,
            stderr,
            exit_code,
        }
    }

    fn directory_missing(cwd: &Path) -> Self {
        CommandResult {
            ok: false,
            stdout: String::new(),
            stderr: format!("Directory does not exist: {}", cwd.display()),
            exit_code: 1,
        }
    }

    fn timed_out(timeout_sec: u64) -> Self {
        CommandResult {
            ok: false,
            stdout: String::new(),
            stderr: format!("Command timed out after {timeout_sec}s"),
            exit_code: -1,
        }
    }

    fn spawn_failed(err: impl std::fmt::Display) -> Self {
        CommandResult {
            ok: false,
            stdout: String::new(),
            stderr: format!("Command execution failed: {err}"),
            exit_code: -1,
        }
    }
}

/// Run `cmd` through the host shell in `cwd`, with a hard wall-clock timeout.
///
/// Never returns an error: any failure mode (missing directory, spawn
/// failure, timeout) is folded into the returned `CommandResult`. The
/// child is given no stdin. On timeout the child is killed and reaped
/// before this function returns; kill failures are swallowed.
pub async fn run(
    cmd: &str,
    cwd: &Path,
    timeout_sec: u64,
    env: Option<&HashMap<String, String>>,
) -> CommandResult {
    if !cwd.is_dir() {
        return CommandResult::directory_missing(cwd);
    }

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .current_dir(cwd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    if let Some(env) = env {
        for (k, v) in env {
            command.env(k, v);
        }
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(cmd, error = %e, "failed to spawn command");
            return CommandResult::spawn_failed(e);
        }
    };

    let mut stdout_pipe = match child.stdout.take() {
        Some(p) => p,
        None => return CommandResult::spawn_failed("stdout pipe missing"),
    };
    let mut stderr_pipe = match child.stderr.take() {
        Some(p) => p,
        None => return CommandResult::spawn_failed("stderr pipe missing"),
    };

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let timeout = Duration::from_secs(timeout_sec);
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            CommandResult::success(
                status.code().unwrap_or(-1),
                String::from_utf8_lossy(&stdout).into_owned(),
                String::from_utf8_lossy(&stderr).into_owned(),
            )
        }
        Ok(Err(e)) => CommandResult::spawn_failed(e),
        Err(_) => {
            tracing::debug!(cmd, timeout_sec, "command timed out, killing child");
            let _ = child.kill().await;
            let _ = child.wait().await;
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            CommandResult::timed_out(timeout_sec)
        }
    }
}

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Check whether the first whitespace-delimited token of `cmd` resolves on
/// `PATH`. Has its own short timeout so a hung lookup can't stall preflight.
pub async fn check_available(cmd: &str) -> bool {
    let program = match cmd.split_whitespace().next() {
        Some(p) => p.to_string(),
        None => return false,
    };

    tokio::time::timeout(AVAILABILITY_TIMEOUT, async move {
        tokio::task::spawn_blocking(move || which::which(&program).is_ok())
            .await
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

//! Tokio backend launcher
//! Real implementation of the BackendLauncher port

use crate::domain::error::Result;
use crate::domain::ports::{BackendLauncher, ExitHandle, LaunchResult, SpawnConfig};
use crate::domain::SupervisorError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Launches the backend as a child process with inherited standard
/// streams, so backend logs land in the host's console.
pub struct TokioBackendLauncher;

impl TokioBackendLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioBackendLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendLauncher for TokioBackendLauncher {
    async fn spawn(&self, config: SpawnConfig) -> Result<LaunchResult> {
        debug!(
            command = %config.command.display(),
            args = ?config.args,
            "spawning child process"
        );
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

        let pid = child.id().ok_or_else(|| {
            SupervisorError::SpawnFailed("child exited before a pid could be read".to_string())
        })?;

        let exit_handle: ExitHandle = Box::pin(async move {
            match child.wait().await {
                Ok(status) => Ok(exit_code_of(status)),
                Err(e) => Err(SupervisorError::SpawnFailed(format!(
                    "failed to wait for child exit: {e}"
                ))),
            }
        });

        Ok(LaunchResult { pid, exit_handle })
    }

    async fn kill(&self, pid: u32) -> Result<()> {
        warn!(pid, "force-killing backend process");
        force_kill(pid)
    }
}

/// Map an exit status to a code; signal terminations report -1.
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<()> {
    // SIGKILL: the cooperative path already had its chance.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    // ESRCH means the process is already gone, which is the goal.
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(SupervisorError::KillFailed {
            pid,
            reason: err.to_string(),
        })
    }
}

#[cfg(windows)]
fn force_kill(pid: u32) -> Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .status()
        .map_err(|e| SupervisorError::KillFailed {
            pid,
            reason: e.to_string(),
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(SupervisorError::KillFailed {
            pid,
            reason: format!("taskkill exited with {status}"),
        })
    }
}

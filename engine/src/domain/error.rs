//! Supervisor error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Failure classes of the supervisor.
///
/// Configuration and resource failures leave the supervisor idle awaiting a
/// manual retry; crash-class failures are retried while monitoring is on.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend executable not found at '{0}'")]
    ExecutableNotFound(String),

    #[error("no free port in {start}..={max}")]
    PortExhausted { start: u16, max: u16 },

    #[error("port probe failed on {port}: {source}")]
    ProbeFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn backend process: {0}")]
    SpawnFailed(String),

    #[error("shutdown request to '{url}' failed: {reason}")]
    ShutdownRequestFailed { url: String, reason: String },

    #[error("failed to terminate backend (pid {pid}): {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SupervisorError {
    /// Crash-class failures, retried automatically while monitoring is on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SupervisorError::SpawnFailed(_))
    }
}

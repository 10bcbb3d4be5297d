//! BackendProcess entity
//! Runtime state of the single supervised backend process

use crate::domain::constants::LOOPBACK_HOST;
use crate::domain::{BackendState, SupervisorError};

/// The supervised backend process.
///
/// Holds runtime state only; launch configuration lives in
/// [`BackendSettings`](crate::domain::BackendSettings). At most one handle is
/// live at a time, and a live handle always has an assigned port:
/// [`mark_running`](Self::mark_running) takes pid and port together.
#[derive(Debug, Default)]
pub struct BackendProcess {
    state: BackendState,
    pid: Option<u32>,
    port: Option<u16>,
    /// Whether an unexpected exit should trigger an automatic restart.
    /// Armed by `mark_starting`, disarmed by `mark_stopping` or
    /// `set_monitoring`.
    monitoring: bool,
    run_count: u32,
}

impl BackendProcess {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Getters =====

    pub fn state(&self) -> BackendState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn monitoring(&self) -> bool {
        self.monitoring
    }

    /// How many times the backend has been spawned, restarts included.
    pub fn run_count(&self) -> u32 {
        self.run_count
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    /// Base URL of the backend, derived from the assigned port.
    /// The trailing slash is load-bearing: downstream code concatenates
    /// paths directly onto it.
    pub fn base_url(&self) -> Option<String> {
        self.port
            .map(|port| format!("http://{LOOPBACK_HOST}:{port}/"))
    }

    pub fn set_monitoring(&mut self, enabled: bool) {
        self.monitoring = enabled;
    }

    // ===== Transitions =====

    /// Begin a start cycle. Arms monitoring so a spawn failure or crash
    /// observed from here on is retried.
    pub fn mark_starting(&mut self) -> Result<(), SupervisorError> {
        match self.state {
            BackendState::Idle => {
                self.state = BackendState::Starting;
                self.monitoring = true;
                Ok(())
            }
            from => Err(invalid(from, BackendState::Starting)),
        }
    }

    /// Record a successful spawn.
    pub fn mark_running(&mut self, pid: u32, port: u16) -> Result<(), SupervisorError> {
        match self.state {
            BackendState::Starting => {
                self.state = BackendState::Running;
                self.pid = Some(pid);
                self.port = Some(port);
                self.run_count += 1;
                Ok(())
            }
            from => Err(invalid(from, BackendState::Running)),
        }
    }

    /// Begin a deliberate shutdown. Disarms monitoring in the same
    /// mutation, so the upcoming exit cannot race into a restart.
    pub fn mark_stopping(&mut self) -> Result<(), SupervisorError> {
        match self.state {
            BackendState::Running => {
                self.monitoring = false;
                self.state = BackendState::Stopping;
                Ok(())
            }
            from => Err(invalid(from, BackendState::Stopping)),
        }
    }

    /// Settle after the process exited (or a start cycle failed).
    /// Clears the handle and the port; the monitoring flag is left for the
    /// caller to inspect.
    pub fn mark_exited(&mut self) {
        self.state = BackendState::Idle;
        self.pid = None;
        self.port = None;
    }
}

fn invalid(from: BackendState, to: BackendState) -> SupervisorError {
    SupervisorError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

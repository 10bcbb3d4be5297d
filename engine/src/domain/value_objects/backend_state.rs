//! BackendState value object
//! Lifecycle states of the supervised backend process

use std::fmt;

/// Where the supervised process is in its lifecycle.
///
/// A cycle runs `Idle -> Starting -> Running -> Stopping -> Idle`; a crash
/// while monitored re-enters `Starting` from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendState {
    /// No live process handle
    #[default]
    Idle,

    /// Port allocation and spawn in flight
    Starting,

    /// Handle live, port assigned
    Running,

    /// Shutdown requested, monitoring disabled
    Stopping,
}

impl BackendState {
    /// States in which a new start request is ignored.
    pub fn is_active(&self) -> bool {
        !matches!(self, BackendState::Idle)
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendState::Idle => write!(f, "idle"),
            BackendState::Starting => write!(f, "starting"),
            BackendState::Running => write!(f, "running"),
            BackendState::Stopping => write!(f, "stopping"),
        }
    }
}

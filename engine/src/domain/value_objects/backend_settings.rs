//! BackendSettings value object
//! Resolved launch-time settings for the supervised backend

use crate::domain::constants::{
    DEFAULT_PREFERRED_PORT, DEFAULT_RESTART_DELAY_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_STOP_GRACE_MS,
};
use crate::domain::RestartPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the supervisor needs to know to launch and manage the
/// backend. Built from [`SupervisorConfig`](crate::infrastructure::SupervisorConfig)
/// by the host, or directly by tests.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Path to the backend server executable
    pub executable: PathBuf,

    /// Extra arguments appended after the port and production flags
    pub extra_args: Vec<String>,

    /// First port tried during allocation
    pub preferred_port: u16,

    /// Pass the production-mode flag to the backend
    pub production: bool,

    pub restart_policy: RestartPolicy,

    /// Delay between a crash and the next restart attempt
    pub restart_delay: Duration,

    /// Timeout on the cooperative-shutdown HTTP request
    pub shutdown_timeout: Duration,

    /// How long a stopped backend may linger before the forced kill
    pub stop_grace: Duration,

    /// Development override: publish this URL and do not spawn anything
    pub attach_url: Option<String>,
}

impl BackendSettings {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
            preferred_port: DEFAULT_PREFERRED_PORT,
            production: true,
            restart_policy: RestartPolicy::default(),
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
            attach_url: None,
        }
    }
}

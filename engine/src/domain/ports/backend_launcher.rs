//! BackendLauncher port
//! Interface for spawning and terminating the backend OS process

use crate::domain::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Configuration for one spawn of the backend process.
///
/// Standard streams are always inherited from the host so operator-visible
/// backend logs are not lost.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
}

/// Future resolving to the exit code once the backend exits.
/// This allows event-driven monitoring without polling.
pub type ExitHandle = Pin<Box<dyn Future<Output = Result<i32>> + Send>>;

/// Result of spawning the backend.
pub struct LaunchResult {
    pub pid: u32,
    pub exit_handle: ExitHandle,
}

impl std::fmt::Debug for LaunchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchResult").field("pid", &self.pid).finish()
    }
}

/// Port for launching the backend's OS process.
#[async_trait]
pub trait BackendLauncher: Send + Sync {
    /// Spawn the backend. A refusal by the OS surfaces as
    /// [`SupervisorError::SpawnFailed`](crate::domain::SupervisorError::SpawnFailed).
    async fn spawn(&self, config: SpawnConfig) -> Result<LaunchResult>;

    /// Forcibly terminate a previously spawned backend.
    async fn kill(&self, pid: u32) -> Result<()>;
}

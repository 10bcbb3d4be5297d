//! ShutdownClient port
//! Interface for asking the backend to terminate itself

use crate::domain::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Port for the cooperative-shutdown request against the backend's HTTP
/// surface.
#[async_trait]
pub trait ShutdownClient: Send + Sync {
    /// Issue a GET to the backend's kill-self endpoint. Resolves once the
    /// request has been attempted; the actual process exit is observed
    /// separately through the exit handle.
    async fn request_kill(&self, url: &str, timeout: Duration) -> Result<()>;
}

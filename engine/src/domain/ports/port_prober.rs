//! PortProber port
//! Interface for checking whether a loopback TCP port is already bound

use crate::domain::error::Result;
use async_trait::async_trait;

/// Port for probing loopback TCP port occupancy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortProber: Send + Sync {
    /// True when something is already listening on `127.0.0.1:<port>`.
    /// Probe errors other than address-in-use are fatal and propagate.
    async fn is_occupied(&self, port: u16) -> Result<bool>;
}

//! Port allocation
//! Finds the first free loopback port at or above the preferred start port

use crate::domain::constants::MAX_PORT;
use crate::domain::error::Result;
use crate::domain::ports::PortProber;
use std::sync::Arc;
use tracing::debug;

/// Sequential upward port scan over an injected prober.
pub struct PortAllocationService {
    prober: Arc<dyn PortProber>,
}

impl PortAllocationService {
    pub fn new(prober: Arc<dyn PortProber>) -> Self {
        Self { prober }
    }

    /// Scan upward from `start` and return the first port the prober
    /// reports free, or `None` once the scan passes [`MAX_PORT`].
    ///
    /// Exhaustion is a reported condition for the caller, not an error;
    /// probe failures are fatal and propagate. Worst case is one probe per
    /// remaining port, a bounded one-time startup cost.
    pub async fn find_available(&self, start: u16) -> Result<Option<u16>> {
        let mut port = start;
        loop {
            if !self.prober.is_occupied(port).await? {
                debug!(port, "allocated free port");
                return Ok(Some(port));
            }
            if port == MAX_PORT {
                return Ok(None);
            }
            port += 1;
        }
    }
}

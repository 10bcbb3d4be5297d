//! Loopback port probe
//! Decides occupancy by binding a throwaway listener

use crate::domain::constants::LOOPBACK_HOST;
use crate::domain::error::Result;
use crate::domain::ports::PortProber;
use crate::domain::SupervisorError;
use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::net::TcpListener;

/// Real implementation of the PortProber port.
///
/// A successful bind proves the port free; the listener is released
/// immediately, leaving no observable side effect beyond the transient
/// bind.
pub struct LoopbackProber;

impl LoopbackProber {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoopbackProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortProber for LoopbackProber {
    async fn is_occupied(&self, port: u16) -> Result<bool> {
        match TcpListener::bind((LOOPBACK_HOST, port)).await {
            Ok(listener) => {
                drop(listener);
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => Ok(true),
            // Anything else (permissions, exhausted descriptors) must not
            // be mistaken for an occupancy verdict.
            Err(e) => Err(SupervisorError::ProbeFailed { port, source: e }),
        }
    }
}

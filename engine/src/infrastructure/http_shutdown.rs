//! HTTP shutdown client
//! Cooperative kill over the backend's HTTP surface

use crate::domain::error::Result;
use crate::domain::ports::ShutdownClient;
use crate::domain::SupervisorError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Real implementation of the ShutdownClient port.
///
/// Uses a ureq agent on the blocking pool; the agent timeout bounds how
/// long a hung backend can stall the host's quit sequence.
pub struct HttpShutdownClient;

impl HttpShutdownClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpShutdownClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShutdownClient for HttpShutdownClient {
    async fn request_kill(&self, url: &str, timeout: Duration) -> Result<()> {
        let request_url = url.to_string();
        let task_url = request_url.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let agent = ureq::AgentBuilder::new().timeout(timeout).build();
            match agent.get(&task_url).call() {
                Ok(response) => {
                    debug!(status = response.status(), "kill-self request acknowledged");
                    Ok(())
                }
                // The backend often dies mid-response; any HTTP status
                // still means the request reached it.
                Err(ureq::Error::Status(code, _)) => {
                    debug!(status = code, "kill-self request answered with an error status");
                    Ok(())
                }
                Err(e) => Err(SupervisorError::ShutdownRequestFailed {
                    url: task_url.clone(),
                    reason: e.to_string(),
                }),
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(e) => Err(SupervisorError::ShutdownRequestFailed {
                url: request_url,
                reason: format!("shutdown request task failed: {e}"),
            }),
        }
    }
}

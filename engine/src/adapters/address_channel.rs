//! Address query channel
//! Request/response surface through which UI-side code asks for the
//! backend's base URL without ever touching process handles

use crate::domain::services::BackendSupervisor;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One inbound request for the backend address.
#[derive(Debug)]
pub struct AddressRequest {
    reply: oneshot::Sender<Option<String>>,
}

/// Client half handed to UI-side code. Cheap to clone.
#[derive(Clone)]
pub struct AddressClient {
    tx: mpsc::Sender<AddressRequest>,
}

impl AddressClient {
    /// Current backend base URL, or `None` when the backend is not
    /// reachable (including when the publisher has shut down). Callers
    /// poll or re-request; this never waits for the address to appear.
    pub async fn backend_url(&self) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(AddressRequest { reply }).await.is_err() {
            return None;
        }
        rx.await.unwrap_or(None)
    }
}

/// Spawn the publisher loop. Every query is answered with the current
/// snapshot immediately.
pub fn spawn_address_publisher(
    supervisor: Arc<BackendSupervisor>,
    shutdown: CancellationToken,
) -> AddressClient {
    let (tx, mut rx) = mpsc::channel::<AddressRequest>(16);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("address publisher shutting down");
                    break;
                }
                request = rx.recv() => {
                    let Some(AddressRequest { reply }) = request else {
                        break;
                    };
                    let url = supervisor.backend_url();
                    debug!(url = url.as_deref().unwrap_or("<none>"), "answering address query");
                    let _ = reply.send(url);
                }
            }
        }
    });
    AddressClient { tx }
}

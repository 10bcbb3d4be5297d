//! Supervisor host daemon
//! Composition root: wires the real adapters, drives the application
//! lifecycle hooks, and serves the address query channel.

use bm_engine::adapters::spawn_address_publisher;
use bm_engine::infrastructure::{HttpShutdownClient, LoopbackProber, TokioBackendLauncher};
use bm_engine::{BackendSupervisor, SupervisorConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bm-hostd", about = "Backend process supervisor host")]
struct Options {
    /// Path to a YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend executable (overrides the config file)
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Preferred starting port for allocation (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = Options::parse();
    let mut config = match &options.config {
        Some(path) => SupervisorConfig::from_yaml_file(path)?,
        None => SupervisorConfig::new(
            options
                .executable
                .clone()
                .unwrap_or_else(|| PathBuf::from("backend-server")),
        ),
    };
    if let Some(executable) = options.executable {
        config.executable = executable;
    }
    if let Some(port) = options.port {
        config.preferred_port = port;
    }
    let settings = config.into_settings()?;
    let stop_grace = settings.stop_grace;

    let supervisor = BackendSupervisor::new(
        settings,
        Arc::new(LoopbackProber::new()),
        Arc::new(TokioBackendLauncher::new()),
        Arc::new(HttpShutdownClient::new()),
    );

    let shutdown = CancellationToken::new();
    let _address = spawn_address_publisher(Arc::clone(&supervisor), shutdown.clone());

    // Application-ready hook: exactly one start per host run. A failed
    // start leaves the published address at None; the UI shows its
    // unavailable state off that.
    if let Err(e) = supervisor.start().await {
        error!(error = %e, "initial backend start failed");
    }

    tokio::signal::ctrl_c().await?;
    info!("quit requested; stopping backend");

    // Quit hook: run the shutdown sequence once, swallowing any further
    // quit signals while it is in flight.
    let stop_supervisor = Arc::clone(&supervisor);
    let stop_sequence = async move {
        if let Err(e) = stop_supervisor.stop().await {
            warn!(error = %e, "stop request failed");
        }
        stop_supervisor
            .await_idle(stop_grace + Duration::from_secs(2))
            .await
    };
    tokio::pin!(stop_sequence);
    loop {
        tokio::select! {
            clean = &mut stop_sequence => {
                if !clean {
                    warn!("backend did not exit within the grace period");
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("shutdown already in progress; ignoring quit request");
            }
        }
    }

    shutdown.cancel();
    info!("host exiting");
    Ok(())
}

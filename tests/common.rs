//! Shared helpers for the e2e tests
//!
//! Each test builds its own supervisor over the real adapters and spawns
//! real `/bin/sh` backends from a private temp dir. Ports come from the
//! OS ephemeral range rather than a fixed list, so tests stay
//! parallel-safe.

use bm_engine::infrastructure::{HttpShutdownClient, LoopbackProber, TokioBackendLauncher};
use bm_engine::{BackendSettings, BackendSupervisor};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Reserve an ephemeral port by binding and releasing it. The short race
/// against other processes is acceptable in tests.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

pub fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

/// Write an executable shell script under `dir` and return its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut permissions = std::fs::metadata(&path)
        .expect("script metadata")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

/// A backend that parks forever, ignoring its arguments.
#[cfg(unix)]
pub fn sleeping_backend(dir: &Path) -> PathBuf {
    write_script(dir, "backend.sh", "exec sleep 600")
}

/// Settings tuned for tests: short grace periods, a restart delay wide
/// enough to observe, and whatever port the caller reserved.
pub fn test_settings(executable: PathBuf, preferred_port: u16) -> BackendSettings {
    let mut settings = BackendSettings::new(executable);
    settings.preferred_port = preferred_port;
    settings.restart_delay = Duration::from_millis(100);
    settings.shutdown_timeout = Duration::from_millis(500);
    settings.stop_grace = Duration::from_millis(300);
    settings
}

pub fn real_supervisor(settings: BackendSettings) -> Arc<BackendSupervisor> {
    BackendSupervisor::new(
        settings,
        Arc::new(LoopbackProber::new()),
        Arc::new(TokioBackendLauncher::new()),
        Arc::new(HttpShutdownClient::new()),
    )
}

//! Backend supervision
//! Event-driven lifecycle management of the backend process: start with
//! port allocation, crash-restart while monitored, cooperative shutdown
//! with a forced-kill fallback

use crate::domain::constants::{KILL_SELF_PATH, MAX_PORT, PORT_FLAG, PROD_FLAG};
use crate::domain::entities::BackendProcess;
use crate::domain::error::Result;
use crate::domain::ports::{BackendLauncher, ExitHandle, PortProber, ShutdownClient, SpawnConfig};
use crate::domain::services::PortAllocationService;
use crate::domain::value_objects::BackendSettings;
use crate::domain::{BackendState, SupervisorError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Single owner of the backend process lifecycle.
///
/// All mutation of the process handle and the published address goes
/// through this instance; everything else reads snapshots. The host
/// composition root constructs one per application run and hands out
/// clones of the `Arc`.
pub struct BackendSupervisor {
    settings: BackendSettings,
    process: Mutex<BackendProcess>,
    allocator: PortAllocationService,
    launcher: Arc<dyn BackendLauncher>,
    shutdown: Arc<dyn ShutdownClient>,
    published: watch::Sender<Option<String>>,
}

impl BackendSupervisor {
    pub fn new(
        settings: BackendSettings,
        prober: Arc<dyn PortProber>,
        launcher: Arc<dyn BackendLauncher>,
        shutdown: Arc<dyn ShutdownClient>,
    ) -> Arc<Self> {
        let (published, _) = watch::channel(None);
        Arc::new(Self {
            settings,
            process: Mutex::new(BackendProcess::new()),
            allocator: PortAllocationService::new(prober),
            launcher,
            shutdown,
            published,
        })
    }

    /// Currently published backend base URL, or `None` whenever the
    /// backend is not reachable. Never blocks.
    pub fn backend_url(&self) -> Option<String> {
        self.published.borrow().clone()
    }

    /// Watch published-address changes.
    pub fn subscribe_url(&self) -> watch::Receiver<Option<String>> {
        self.published.subscribe()
    }

    pub async fn state(&self) -> BackendState {
        self.process.lock().await.state()
    }

    /// How many times the backend has been spawned, restarts included.
    pub async fn run_count(&self) -> u32 {
        self.process.lock().await.run_count()
    }

    /// Start the backend. A no-op while a start is in flight or the
    /// backend is running; configuration and port failures leave the
    /// supervisor idle for a later manual retry.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if let Some(url) = &self.settings.attach_url {
            info!(url = %url, "attach mode: publishing fixed backend url without spawning");
            self.published.send_replace(Some(url.clone()));
            return Ok(());
        }

        {
            let mut process = self.process.lock().await;
            if process.state().is_active() {
                info!(state = %process.state(), "backend already active; ignoring start request");
                return Ok(());
            }
            // Checked before leaving Idle: a missing executable must not
            // disturb the state machine at all.
            if let Err(e) = self.ensure_executable() {
                error!(error = %e, "failed to start backend");
                return Err(e);
            }
            process.mark_starting()?;
        }

        if let Err(e) = self.start_cycle().await {
            error!(error = %e, "failed to start backend");
            self.settle_failed_cycle(&e).await;
            return Err(e);
        }
        Ok(())
    }

    /// Cooperative shutdown: disable monitoring, then ask the backend to
    /// terminate itself over HTTP. Resolves once the request has been
    /// attempted; it does not wait for the process to exit. The
    /// forced-kill fallback fires later if the backend lingers.
    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        let (url, pid) = {
            let mut process = self.process.lock().await;
            if process.state() != BackendState::Running {
                // A stop request also disarms any pending restart.
                process.set_monitoring(false);
                info!(state = %process.state(), "no running backend process to stop");
                return Ok(());
            }
            process.mark_stopping()?;
            (process.base_url(), process.pid())
        };

        if let Some(url) = url {
            let kill_url = format!("{url}{KILL_SELF_PATH}");
            info!(url = %kill_url, "requesting cooperative backend shutdown");
            if let Err(e) = self
                .shutdown
                .request_kill(&kill_url, self.settings.shutdown_timeout)
                .await
            {
                warn!(error = %e, "cooperative shutdown request failed; relying on process exit");
            }
        }

        if let Some(pid) = pid {
            self.schedule_forced_kill(pid);
        }
        Ok(())
    }

    /// Wait for the backend to settle in `Idle`, bounded by `timeout`.
    /// Returns false on timeout.
    pub async fn await_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state().await == BackendState::Idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    fn ensure_executable(&self) -> Result<()> {
        let executable = &self.settings.executable;
        if executable.exists() {
            Ok(())
        } else {
            Err(SupervisorError::ExecutableNotFound(
                executable.display().to_string(),
            ))
        }
    }

    /// One allocation + spawn attempt. The caller has already moved the
    /// entity into `Starting`.
    async fn start_cycle(self: &Arc<Self>) -> Result<()> {
        // Re-checked per cycle: the executable can vanish between
        // restarts (an upgrade replacing the install directory).
        self.ensure_executable()?;

        let preferred = self.settings.preferred_port;
        let port = match self.allocator.find_available(preferred).await? {
            Some(port) => port,
            None => {
                return Err(SupervisorError::PortExhausted {
                    start: preferred,
                    max: MAX_PORT,
                })
            }
        };

        info!(port, executable = %self.settings.executable.display(), "spawning backend process");
        let launch = self.launcher.spawn(self.spawn_config(port)).await?;
        let pid = launch.pid;
        let exit_handle = launch.exit_handle;

        {
            let mut process = self.process.lock().await;
            // A stop request may have landed while the spawn was in
            // flight; the fresh process is terminated instead of promoted.
            if process.monitoring() {
                process.mark_running(pid, port)?;
                let url = process.base_url();
                drop(process);
                self.published.send_replace(url.clone());
                info!(pid, url = url.as_deref().unwrap_or_default(), "backend running");
                self.watch_exit(pid, exit_handle);
                return Ok(());
            }
        }

        warn!(pid, "stop requested during start; terminating fresh backend");
        if let Err(e) = self.launcher.kill(pid).await {
            error!(pid, error = %e, "failed to terminate fresh backend");
        }
        // Reap the child so it cannot linger as a zombie.
        tokio::spawn(async move {
            let _ = exit_handle.await;
        });
        self.process.lock().await.mark_exited();
        self.published.send_replace(None);
        Ok(())
    }

    fn spawn_config(&self, port: u16) -> SpawnConfig {
        let mut args = vec![PORT_FLAG.to_string(), port.to_string()];
        if self.settings.production {
            args.push(PROD_FLAG.to_string());
        }
        args.extend(self.settings.extra_args.iter().cloned());
        SpawnConfig {
            command: self.settings.executable.clone(),
            args,
        }
    }

    /// Register the exit observer for a spawned process.
    fn watch_exit(self: &Arc<Self>, pid: u32, exit_handle: ExitHandle) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let exit_code = match exit_handle.await {
                Ok(code) => code,
                Err(e) => {
                    warn!(pid, error = %e, "failed to observe backend exit; assuming failure");
                    -1
                }
            };
            supervisor.handle_exit(pid, exit_code).await;
        });
    }

    /// Exit observer: settle the entity, then apply the restart policy.
    /// Monitoring was disarmed before any deliberate shutdown, so an exit
    /// seen with monitoring on is an unexpected crash.
    async fn handle_exit(self: &Arc<Self>, pid: u32, exit_code: i32) {
        let monitoring = {
            let mut process = self.process.lock().await;
            if process.pid() != Some(pid) {
                debug!(pid, "exit event for a superseded process; ignoring");
                return;
            }
            process.mark_exited();
            process.monitoring()
        };

        if monitoring && self.settings.restart_policy.should_restart(exit_code) {
            warn!(pid, exit_code, "backend exited unexpectedly; restarting");
            self.schedule_restart();
        } else {
            info!(pid, exit_code, "backend exited");
            self.published.send_replace(None);
        }
    }

    /// Queue a restart attempt on a fresh task. Attempts are unbounded;
    /// the configured delay is the only brake on a crash loop.
    fn schedule_restart(self: &Arc<Self>) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let delay = supervisor.settings.restart_delay;
            if !delay.is_zero() {
                sleep(delay).await;
            }
            supervisor.try_restart().await;
        });
    }

    async fn try_restart(self: &Arc<Self>) {
        {
            let mut process = self.process.lock().await;
            if !process.monitoring() || process.state().is_active() {
                debug!(state = %process.state(), "restart no longer applicable; skipping");
                return;
            }
            if let Err(e) = process.mark_starting() {
                error!(error = %e, "restart aborted");
                return;
            }
        }

        if let Err(e) = self.start_cycle().await {
            error!(error = %e, "restart attempt failed");
            self.settle_failed_cycle(&e).await;
        }
    }

    /// Roll a failed start cycle back to `Idle`. Crash-class failures are
    /// requeued while monitoring stays armed; anything else disarms and
    /// clears the published address.
    async fn settle_failed_cycle(self: &Arc<Self>, error: &SupervisorError) {
        let retry = {
            let mut process = self.process.lock().await;
            process.mark_exited();
            if !error.is_retryable() {
                process.set_monitoring(false);
            }
            error.is_retryable() && process.monitoring()
        };

        if retry {
            self.schedule_restart();
        } else {
            self.published.send_replace(None);
        }
    }

    /// Forced-termination fallback for a backend that ignores the
    /// cooperative request.
    fn schedule_forced_kill(self: &Arc<Self>, pid: u32) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            sleep(supervisor.settings.stop_grace).await;
            let still_alive = {
                let process = supervisor.process.lock().await;
                process.pid() == Some(pid)
            };
            if still_alive {
                warn!(pid, "backend still alive after stop grace period; killing");
                if let Err(e) = supervisor.launcher.kill(pid).await {
                    error!(pid, error = %e, "forced kill failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{LaunchResult, MockPortProber};
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::sync::oneshot;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeLauncher {
        spawn_requests: AtomicUsize,
        fail_spawns: AtomicUsize,
        next_pid: AtomicU32,
        exits: AsyncMutex<Vec<(u32, oneshot::Sender<i32>)>>,
        kills: AsyncMutex<Vec<u32>>,
        last_config: AsyncMutex<Option<SpawnConfig>>,
    }

    impl FakeLauncher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spawn_requests: AtomicUsize::new(0),
                fail_spawns: AtomicUsize::new(0),
                next_pid: AtomicU32::new(1000),
                exits: AsyncMutex::new(Vec::new()),
                kills: AsyncMutex::new(Vec::new()),
                last_config: AsyncMutex::new(None),
            })
        }

        fn spawn_requests(&self) -> usize {
            self.spawn_requests.load(Ordering::SeqCst)
        }

        /// Make the process from the most recent spawn exit with `code`.
        async fn exit_current(&self, code: i32) {
            let (_pid, tx) = self.exits.lock().await.pop().expect("a live fake process");
            tx.send(code).expect("exit observer listening");
        }
    }

    #[async_trait::async_trait]
    impl BackendLauncher for FakeLauncher {
        async fn spawn(&self, config: SpawnConfig) -> Result<LaunchResult> {
            self.spawn_requests.fetch_add(1, Ordering::SeqCst);
            *self.last_config.lock().await = Some(config);
            if self.fail_spawns.load(Ordering::SeqCst) > 0 {
                self.fail_spawns.fetch_sub(1, Ordering::SeqCst);
                return Err(SupervisorError::SpawnFailed(
                    "permission denied".to_string(),
                ));
            }
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            self.exits.lock().await.push((pid, tx));
            let exit_handle: ExitHandle = Box::pin(async move { Ok(rx.await.unwrap_or(-1)) });
            Ok(LaunchResult { pid, exit_handle })
        }

        async fn kill(&self, pid: u32) -> Result<()> {
            self.kills.lock().await.push(pid);
            Ok(())
        }
    }

    struct FakeShutdown {
        requests: AsyncMutex<Vec<String>>,
    }

    impl FakeShutdown {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requests: AsyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ShutdownClient for FakeShutdown {
        async fn request_kill(&self, url: &str, _timeout: Duration) -> Result<()> {
            self.requests.lock().await.push(url.to_string());
            Ok(())
        }
    }

    fn prober_with_occupied(occupied: HashSet<u16>) -> Arc<MockPortProber> {
        let mut prober = MockPortProber::new();
        prober
            .expect_is_occupied()
            .returning(move |port| Ok(occupied.contains(&port)));
        Arc::new(prober)
    }

    fn test_settings(executable: &Path) -> BackendSettings {
        let mut settings = BackendSettings::new(executable);
        settings.restart_delay = Duration::from_millis(10);
        settings
    }

    struct Harness {
        supervisor: Arc<BackendSupervisor>,
        launcher: Arc<FakeLauncher>,
        shutdown: Arc<FakeShutdown>,
        _executable: tempfile::NamedTempFile,
    }

    fn harness() -> Harness {
        harness_with(HashSet::new(), |_| {})
    }

    fn harness_with(occupied: HashSet<u16>, tweak: impl FnOnce(&mut BackendSettings)) -> Harness {
        let executable = tempfile::NamedTempFile::new().expect("temp executable");
        let mut settings = test_settings(executable.path());
        tweak(&mut settings);
        let launcher = FakeLauncher::new();
        let shutdown = FakeShutdown::new();
        let supervisor = BackendSupervisor::new(
            settings,
            prober_with_occupied(occupied),
            Arc::clone(&launcher) as Arc<dyn BackendLauncher>,
            Arc::clone(&shutdown) as Arc<dyn ShutdownClient>,
        );
        Harness {
            supervisor,
            launcher,
            shutdown,
            _executable: executable,
        }
    }

    async fn settle(harness: &Harness, check: impl Fn(u32, BackendState) -> bool) {
        for _ in 0..200 {
            let run_count = harness.supervisor.run_count().await;
            let state = harness.supervisor.state().await;
            if check(run_count, state) {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("supervisor did not reach the expected state in time");
    }

    #[tokio::test]
    async fn test_start_publishes_backend_url() {
        let harness = harness();
        assert_eq!(harness.supervisor.backend_url(), None);

        harness.supervisor.start().await.unwrap();

        assert_eq!(
            harness.supervisor.backend_url().as_deref(),
            Some("http://127.0.0.1:8820/")
        );
        assert_eq!(harness.supervisor.state().await, BackendState::Running);
        assert_eq!(harness.launcher.spawn_requests(), 1);
    }

    #[tokio::test]
    async fn test_spawn_contract_arguments() {
        let harness = harness_with(HashSet::new(), |settings| {
            settings.extra_args = vec!["--cache-dir".to_string(), "/tmp/models".to_string()];
        });
        harness.supervisor.start().await.unwrap();

        let config = harness.launcher.last_config.lock().await.clone().unwrap();
        assert_eq!(
            config.args,
            vec!["--port", "8820", "--prod", "--cache-dir", "/tmp/models"]
        );
    }

    #[tokio::test]
    async fn test_production_flag_suppressed_in_dev() {
        let harness = harness_with(HashSet::new(), |settings| settings.production = false);
        harness.supervisor.start().await.unwrap();

        let config = harness.launcher.last_config.lock().await.clone().unwrap();
        assert_eq!(config.args, vec!["--port", "8820"]);
    }

    #[tokio::test]
    async fn test_occupied_preferred_port_is_skipped() {
        let harness = harness_with(HashSet::from([8820]), |_| {});
        harness.supervisor.start().await.unwrap();

        assert_eq!(
            harness.supervisor.backend_url().as_deref(),
            Some("http://127.0.0.1:8821/")
        );
    }

    #[tokio::test]
    async fn test_exact_url_for_allocated_port() {
        let harness = harness_with(HashSet::new(), |settings| settings.preferred_port = 8831);
        harness.supervisor.start().await.unwrap();

        assert_eq!(
            harness.supervisor.backend_url().as_deref(),
            Some("http://127.0.0.1:8831/")
        );
    }

    #[tokio::test]
    async fn test_double_start_is_noop() {
        let harness = harness();
        harness.supervisor.start().await.unwrap();
        harness.supervisor.start().await.unwrap();

        assert_eq!(harness.launcher.spawn_requests(), 1);
        assert_eq!(harness.supervisor.run_count().await, 1);
    }

    #[tokio::test]
    async fn test_crash_triggers_exactly_one_restart() {
        let harness = harness();
        harness.supervisor.start().await.unwrap();

        harness.launcher.exit_current(1).await;
        settle(&harness, |run_count, state| {
            run_count == 2 && state == BackendState::Running
        })
        .await;

        assert_eq!(harness.launcher.spawn_requests(), 2);
        assert!(harness.supervisor.backend_url().is_some());
    }

    #[tokio::test]
    async fn test_clean_exit_does_not_restart() {
        let harness = harness();
        harness.supervisor.start().await.unwrap();

        harness.launcher.exit_current(0).await;
        settle(&harness, |_, state| state == BackendState::Idle).await;
        sleep(Duration::from_millis(50)).await;

        assert_eq!(harness.launcher.spawn_requests(), 1);
        assert_eq!(harness.supervisor.backend_url(), None);
    }

    #[tokio::test]
    async fn test_stop_suppresses_restart() {
        let harness = harness();
        harness.supervisor.start().await.unwrap();
        harness.supervisor.stop().await.unwrap();

        assert_eq!(
            harness.shutdown.requests.lock().await.as_slice(),
            ["http://127.0.0.1:8820/process/kill_self"]
        );

        // Even a failure exit code must not restart a deliberately
        // stopped backend.
        harness.launcher.exit_current(1).await;
        settle(&harness, |_, state| state == BackendState::Idle).await;
        sleep(Duration::from_millis(50)).await;

        assert_eq!(harness.launcher.spawn_requests(), 1);
        assert_eq!(harness.supervisor.backend_url(), None);
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let harness = harness();
        harness.supervisor.stop().await.unwrap();

        assert!(harness.shutdown.requests.lock().await.is_empty());
        assert_eq!(harness.launcher.spawn_requests(), 0);
    }

    #[tokio::test]
    async fn test_stop_disarms_pending_restart() {
        let harness = harness_with(HashSet::new(), |settings| {
            settings.restart_delay = Duration::from_millis(100);
        });
        harness.supervisor.start().await.unwrap();

        // Crash, then stop inside the restart-delay window.
        harness.launcher.exit_current(1).await;
        settle(&harness, |_, state| state == BackendState::Idle).await;
        harness.supervisor.stop().await.unwrap();

        sleep(Duration::from_millis(250)).await;
        assert_eq!(harness.launcher.spawn_requests(), 1);
        assert_eq!(harness.supervisor.state().await, BackendState::Idle);
    }

    #[tokio::test]
    async fn test_missing_executable_reports_error() {
        let harness = harness_with(HashSet::new(), |settings| {
            settings.executable = "/nonexistent/backend-server".into();
        });

        let result = harness.supervisor.start().await;
        assert!(matches!(
            result,
            Err(SupervisorError::ExecutableNotFound(_))
        ));
        assert_eq!(harness.supervisor.backend_url(), None);
        assert_eq!(harness.launcher.spawn_requests(), 0);
        assert_eq!(harness.supervisor.state().await, BackendState::Idle);
    }

    #[tokio::test]
    async fn test_port_exhaustion_reports_error() {
        let occupied: HashSet<u16> = (65530..=65535).collect();
        let harness = harness_with(occupied, |settings| settings.preferred_port = 65530);

        let result = harness.supervisor.start().await;
        assert!(matches!(
            result,
            Err(SupervisorError::PortExhausted { start: 65530, .. })
        ));
        assert_eq!(harness.supervisor.backend_url(), None);
        assert_eq!(harness.supervisor.state().await, BackendState::Idle);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_retried() {
        let harness = harness();
        harness.launcher.fail_spawns.store(1, Ordering::SeqCst);

        let result = harness.supervisor.start().await;
        assert!(matches!(result, Err(SupervisorError::SpawnFailed(_))));

        settle(&harness, |run_count, state| {
            run_count == 1 && state == BackendState::Running
        })
        .await;
        assert_eq!(harness.launcher.spawn_requests(), 2);
        assert!(harness.supervisor.backend_url().is_some());
    }

    #[tokio::test]
    async fn test_url_watch_observes_transitions() {
        let harness = harness();
        let rx = harness.supervisor.subscribe_url();
        assert_eq!(*rx.borrow(), None);

        harness.supervisor.start().await.unwrap();
        assert_eq!(
            rx.borrow().as_deref(),
            Some("http://127.0.0.1:8820/")
        );

        harness.launcher.exit_current(0).await;
        settle(&harness, |_, state| state == BackendState::Idle).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(*rx.borrow(), None);
    }

    #[tokio::test]
    async fn test_attach_mode_publishes_without_spawning() {
        let harness = harness_with(HashSet::new(), |settings| {
            settings.attach_url = Some("http://127.0.0.1:8820/".to_string());
        });

        harness.supervisor.start().await.unwrap();

        assert_eq!(
            harness.supervisor.backend_url().as_deref(),
            Some("http://127.0.0.1:8820/")
        );
        assert_eq!(harness.launcher.spawn_requests(), 0);
        assert_eq!(harness.supervisor.state().await, BackendState::Idle);
    }

    #[tokio::test]
    async fn test_forced_kill_fires_after_grace() {
        let harness = harness_with(HashSet::new(), |settings| {
            settings.stop_grace = Duration::from_millis(50);
        });
        harness.supervisor.start().await.unwrap();
        harness.supervisor.stop().await.unwrap();

        // The fake process never exits on its own.
        sleep(Duration::from_millis(200)).await;
        assert_eq!(harness.launcher.kills.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_forced_kill_skipped_when_backend_exits() {
        let harness = harness_with(HashSet::new(), |settings| {
            settings.stop_grace = Duration::from_millis(50);
        });
        harness.supervisor.start().await.unwrap();
        harness.supervisor.stop().await.unwrap();
        harness.launcher.exit_current(0).await;

        sleep(Duration::from_millis(200)).await;
        assert!(harness.launcher.kills.lock().await.is_empty());
    }
}

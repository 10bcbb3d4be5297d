pub mod config;
pub mod http_shutdown;
pub mod loopback_prober;
pub mod tokio_launcher;

pub use config::SupervisorConfig;
pub use http_shutdown::HttpShutdownClient;
pub use loopback_prober::LoopbackProber;
pub use tokio_launcher::TokioBackendLauncher;

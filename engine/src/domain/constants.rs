//! Domain Constants
//!
//! Common constants used throughout the supervisor

/// First port tried when allocating the backend's listen port
pub const DEFAULT_PREFERRED_PORT: u16 = 8820;

/// Highest port the allocator will probe
pub const MAX_PORT: u16 = 65535;

/// Loopback host the backend binds and the prober checks
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Path, relative to the base URL, of the backend's cooperative-shutdown endpoint
pub const KILL_SELF_PATH: &str = "process/kill_self";

/// Flag carrying the assigned port to the backend
pub const PORT_FLAG: &str = "--port";

/// Flag telling the backend to run in production mode
pub const PROD_FLAG: &str = "--prod";

/// Exit code indicating a deliberate, successful backend exit
pub const SUCCESS_EXIT_CODE: i32 = 0;

/// Default timeout for the cooperative-shutdown HTTP request, in milliseconds
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Default grace period before the forced-kill fallback fires, in milliseconds
pub const DEFAULT_STOP_GRACE_MS: u64 = 10_000;

/// Default delay between a crash and the next restart attempt, in milliseconds
/// 0 preserves the immediate-restart behavior; raise it to brake crash loops
pub const DEFAULT_RESTART_DELAY_MS: u64 = 0;

//! Backend process supervisor engine
//!
//! Launches the desktop application's backend server on a free loopback
//! port, keeps it alive while the host runs, and publishes the discovered
//! base URL to the UI side through an in-process query channel.

pub mod adapters;
pub mod domain;
pub mod infrastructure;

pub use domain::services::BackendSupervisor;
pub use domain::{BackendSettings, BackendState, RestartPolicy, SupervisorError};
pub use infrastructure::SupervisorConfig;

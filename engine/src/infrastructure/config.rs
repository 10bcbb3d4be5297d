//! Configuration loading from YAML
//!
//! One file configures the single supervised backend; everything except
//! the executable path has a default.

use crate::domain::constants::DEFAULT_PREFERRED_PORT;
use crate::domain::error::Result;
use crate::domain::{BackendSettings, RestartPolicy, SupervisorError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk configuration for the supervisor host.
#[derive(Debug, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Path to the backend server executable
    pub executable: PathBuf,

    /// Extra arguments appended after the port and production flags
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_preferred_port")]
    pub preferred_port: u16,

    #[serde(default = "default_production")]
    pub production: bool,

    /// Restart policy: "never", "always" or "on-failure"
    #[serde(default)]
    pub restart: Option<String>,

    #[serde(default)]
    pub restart_delay_ms: Option<u64>,

    #[serde(default)]
    pub shutdown_timeout_ms: Option<u64>,

    #[serde(default)]
    pub stop_grace_ms: Option<u64>,

    /// Development override: publish this URL and do not spawn anything
    #[serde(default)]
    pub attach_url: Option<String>,
}

fn default_preferred_port() -> u16 {
    DEFAULT_PREFERRED_PORT
}

fn default_production() -> bool {
    true
}

impl SupervisorConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            preferred_port: DEFAULT_PREFERRED_PORT,
            production: true,
            restart: None,
            restart_delay_ms: None,
            shutdown_timeout_ms: None,
            stop_grace_ms: None,
            attach_url: None,
        }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SupervisorError::InvalidConfig(format!("failed to read '{}': {e}", path.display()))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            SupervisorError::InvalidConfig(format!("failed to parse '{}': {e}", path.display()))
        })
    }

    /// Resolve into the domain-level settings, validating stringly fields.
    pub fn into_settings(self) -> Result<BackendSettings> {
        let mut settings = BackendSettings::new(self.executable);
        settings.extra_args = self.args;
        settings.preferred_port = self.preferred_port;
        settings.production = self.production;
        if let Some(raw) = self.restart.as_deref() {
            settings.restart_policy = RestartPolicy::parse(raw).ok_or_else(|| {
                SupervisorError::InvalidConfig(format!("unknown restart policy '{raw}'"))
            })?;
        }
        if let Some(ms) = self.restart_delay_ms {
            settings.restart_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.shutdown_timeout_ms {
            settings.shutdown_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.stop_grace_ms {
            settings.stop_grace = Duration::from_millis(ms);
        }
        settings.attach_url = self.attach_url;
        Ok(settings)
    }
}

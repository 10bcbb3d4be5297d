//! RestartPolicy value object
//! Defines when the backend should be automatically restarted

use crate::domain::constants::SUCCESS_EXIT_CODE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for automatically restarting the backend after an exit observed
/// while monitoring is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart the backend
    Never,

    /// Always restart, regardless of exit code
    Always,

    /// Restart only on failure (non-zero exit code)
    #[default]
    OnFailure,
}

impl RestartPolicy {
    /// Check if the backend should be restarted given an exit code
    pub fn should_restart(&self, exit_code: i32) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::Always => true,
            RestartPolicy::OnFailure => exit_code != SUCCESS_EXIT_CODE,
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "never" | "no" => Some(RestartPolicy::Never),
            "always" => Some(RestartPolicy::Always),
            "on-failure" | "onfailure" => Some(RestartPolicy::OnFailure),
            _ => None,
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Never => write!(f, "never"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::OnFailure => write!(f, "on-failure"),
        }
    }
}

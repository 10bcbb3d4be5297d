pub mod backend_settings;
pub mod backend_state;
pub mod restart_policy;

pub use backend_settings::BackendSettings;
pub use backend_state::BackendState;
pub use restart_policy::RestartPolicy;

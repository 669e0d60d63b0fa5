//! Application state

use std::sync::Arc;

use runbox_core::config::ServerConfig;
use runbox_sandbox::ExecMode;

use crate::admission::AdmissionGate;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub admission: Arc<AdmissionGate>,
    pub exec_mode: ExecMode,
}

impl AppState {
    pub fn new(config: ServerConfig, exec_mode: ExecMode) -> Self {
        let admission = Arc::new(AdmissionGate::new(config.limits.max_per_peer));
        Self {
            config: Arc::new(config),
            admission,
            exec_mode,
        }
    }
}

//! Health and metrics endpoints

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use runbox_sandbox::ExecMode;

use crate::state::AppState;

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.admission.stats();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sandbox: state.exec_mode == ExecMode::Container,
        active_sessions: stats.active_sessions,
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    let stats = state.admission.stats();

    // Prometheus format
    format!(
        r#"# HELP runbox_active_sessions Currently executing sessions
# TYPE runbox_active_sessions gauge
runbox_active_sessions {}

# HELP runbox_active_peers Peers holding at least one admission slot
# TYPE runbox_active_peers gauge
runbox_active_peers {}

# HELP runbox_max_sessions_per_peer Per-peer concurrency cap
# TYPE runbox_max_sessions_per_peer gauge
runbox_max_sessions_per_peer {}
"#,
        stats.active_sessions,
        stats.active_peers,
        state.admission.max_per_peer()
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether executions run in hardened containers (false in the native
    /// fallback mode).
    pub sandbox: bool,
    pub active_sessions: usize,
}

//! Server configuration
//!
//! Everything is read from the environment at startup; the limits are fixed
//! at compile time and shared by both execution modes.

use std::path::PathBuf;
use std::time::Duration;

/// Hard caps applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum accepted source size.
    pub max_code_bytes: usize,
    /// Maximum accepted batch stdin size.
    pub max_stdin_bytes: usize,
    /// Byte cap per captured output stream (stdout and stderr each).
    pub max_output_bytes: usize,
    /// Concurrent sessions allowed per peer.
    pub max_per_peer: usize,
    /// Wall-clock ceiling for an interactive stream session.
    pub stream_deadline: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_code_bytes: 64 * 1024,
            max_stdin_bytes: 1024 * 1024,
            max_output_bytes: 1024 * 1024,
            max_per_peer: 3,
            stream_deadline: Duration::from_secs(5 * 60),
        }
    }
}

impl Limits {
    /// Request-body ceiling enforced before parsing: code + stdin + slack
    /// for the JSON envelope.
    pub fn max_body_bytes(&self) -> usize {
        self.max_code_bytes + self.max_stdin_bytes + 1024
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Static front-end root, served with SPA fallback when the directory
    /// exists.
    pub static_root: PathBuf,
    pub limits: Limits,
}

impl ServerConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut limits = Limits::default();
        if let Some(max) = std::env::var("RUNBOX_MAX_PER_PEER")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            limits.max_per_peer = max;
        }

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            static_root: std::env::var("STATIC_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("dist")),
            limits,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_root: PathBuf::from("dist"),
            limits: Limits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_cap_covers_code_stdin_and_slack() {
        let limits = Limits::default();
        assert_eq!(
            limits.max_body_bytes(),
            64 * 1024 + 1024 * 1024 + 1024
        );
    }

    #[test]
    fn defaults_match_service_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.limits.max_per_peer, 3);
        assert_eq!(config.limits.stream_deadline, Duration::from_secs(300));
    }
}

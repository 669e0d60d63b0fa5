//! Sandbox error types

use thiserror::Error;

/// Failures of the execution machinery itself. A user program failing is
/// never an `ExecError`; it is reported through the captured output and the
/// exit code.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("workspace setup failed: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to start sandbox: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sandbox runtime unavailable; cannot run {0} natively")]
    SandboxUnavailable(&'static str),

    #[error("i/o error during execution: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sandbox operations
pub type ExecResult<T> = Result<T, ExecError>;

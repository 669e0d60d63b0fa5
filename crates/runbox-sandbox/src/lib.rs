//! Runbox Sandbox - hardened execution of untrusted code
//!
//! This crate provides:
//! - Per-session scratch workspaces with guaranteed cleanup
//! - The hardened container invocation and its process handle
//! - One-shot (batch) execution with capped output capture
//! - Long-lived full-duplex (stream) sessions

pub mod batch;
pub mod error;
pub mod output;
pub mod spawn;
pub mod stream;
pub mod workspace;

pub use batch::{execute, BatchOutcome};
pub use error::{ExecError, ExecResult};
pub use spawn::{probe_container_runtime, ExecMode, Sandbox};
pub use stream::run_session;
pub use workspace::Workspace;

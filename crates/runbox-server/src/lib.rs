//! Runbox Server - HTTP API for the code execution broker
//!
//! This crate provides:
//! - The batch execution endpoint (request/response)
//! - The interactive stream endpoint (WebSocket)
//! - Per-peer admission control
//! - Health and metrics endpoints

pub mod admission;
pub mod api;
pub mod middleware;
pub mod state;

pub use api::create_router;
pub use state::AppState;

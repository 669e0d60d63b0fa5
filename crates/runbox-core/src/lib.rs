//! Runbox Core - Core types for the code execution broker
//!
//! This crate provides the foundational types used across runbox:
//! - The language registry (tag -> source name, image, build/run steps)
//! - Batch and stream wire protocol types
//! - Configuration types

pub mod config;
pub mod language;
pub mod protocol;

pub use config::{Limits, ServerConfig};
pub use language::{Language, LanguageSpec};

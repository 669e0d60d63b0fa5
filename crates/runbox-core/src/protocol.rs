//! Wire protocol types
//!
//! Batch executions speak a single JSON request/response pair. Stream
//! sessions speak internally tagged JSON frames in both directions over a
//! full-duplex transport.

use serde::{Deserialize, Serialize};

/// POST /api/run request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub stdin: String,
}

/// POST /api/run response body
///
/// `success` reports the user program's outcome; the HTTP status does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Frames sent by the client on a stream session.
///
/// `Init` must arrive first and exactly once; `Stdin` after `Eof` is
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Init { language: String, code: String },
    Stdin { data: String },
    Eof,
    Kill,
}

/// Frames sent to the client on a stream session.
///
/// After `Exit` or `Error` no further frame is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Stdout { data: String },
    Stderr { data: String },
    Exit { code: i32 },
    Error { data: String },
}

//! Batch execution API

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use runbox_core::language::Language;
use runbox_core::protocol::{RunRequest, RunResponse};
use runbox_sandbox::ExecError;

use crate::admission::peer_identity;
use crate::state::AppState;

/// POST /api/run
///
/// A 200 means the request was admitted and an execution attempt happened;
/// the user program's outcome is carried by the body, never the status.
pub async fn run_batch(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        // The pre-parse body cap surfaces here as 413; everything else is a
        // malformed request.
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    let limits = &state.config.limits;

    if request.code.len() > limits.max_code_bytes {
        return Err(ApiError::BadRequest("code exceeds size limit".into()));
    }
    if request.stdin.len() > limits.max_stdin_bytes {
        return Err(ApiError::BadRequest("stdin exceeds size limit".into()));
    }
    let language = Language::from_tag(&request.language).ok_or_else(|| {
        let supported: Vec<&str> = Language::ALL.iter().map(|l| l.tag()).collect();
        ApiError::BadRequest(format!(
            "unsupported language {:?} (supported: {})",
            request.language,
            supported.join(", ")
        ))
    })?;

    let peer = peer_identity(&headers, remote);
    let _permit = state
        .admission
        .try_acquire(&peer)
        .ok_or(ApiError::TooManyRequests)?;

    let outcome = runbox_sandbox::execute(
        language,
        &request.code,
        &request.stdin,
        limits,
        state.exec_mode,
    )
    .await?;

    Ok(Json(RunResponse {
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        success: outcome.success,
    }))
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge,
    TooManyRequests,
    Internal(String),
}

impl From<ExecError> for ApiError {
    fn from(e: ExecError) -> Self {
        warn!(error = %e, "execution failed");
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "request body too large".into())
            }
            ApiError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "too many requests".into())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

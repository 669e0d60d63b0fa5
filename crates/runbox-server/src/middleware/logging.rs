//! Request logging middleware

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::connect_info::ConnectInfo;
use axum::{extract::Request, middleware::Next, response::Response};
use tracing::info;

use crate::admission::peer_identity;

/// Logs every request with the peer key used for admission accounting, so
/// 429s in the log line up with a visible peer.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| peer_identity(request.headers(), *addr))
        .unwrap_or_else(|| "unknown".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        peer = %peer,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "request completed"
    );

    response
}

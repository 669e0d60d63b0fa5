//! Runbox - sandboxed code execution broker
//!
//! Accepts untrusted source code over HTTP (one-shot) or WebSocket
//! (interactive), runs it in a hardened container per request, and streams
//! stdin/stdout/stderr between the client and the sandbox.

use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use runbox_core::config::ServerConfig;
use runbox_sandbox::{probe_container_runtime, ExecMode};
use runbox_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting runbox v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();

    let exec_mode = if probe_container_runtime().await {
        ExecMode::Container
    } else {
        warn!("container runtime unreachable; falling back to native execution (interpreted languages only)");
        ExecMode::Native
    };
    info!(mode = ?exec_mode, "sandbox mode selected");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let static_root = config.static_root.clone();
    let state = AppState::new(config, exec_mode);

    // The stream transport accepts any origin; CORS on the HTTP side is
    // equally permissive. Admission gating substitutes for origin checks.
    let mut app = create_router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    if static_root.is_dir() {
        info!(root = %static_root.display(), "serving static front-end");
        app = app.fallback_service(
            ServeDir::new(&static_root).fallback(ServeFile::new(static_root.join("index.html"))),
        );
    }

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{addr} (batch: POST /api/run, stream: WS /api/ws, health: GET /api/health)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

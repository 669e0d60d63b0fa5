//! Interactive stream API
//!
//! Bridges a WebSocket to a stream session: inbound text frames are parsed
//! into protocol frames and fed to the session; session output frames are
//! serialized back onto the socket. The session itself is transport-blind.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use runbox_core::protocol::{InboundFrame, OutboundFrame};
use runbox_sandbox::run_session;

use crate::admission::{peer_identity, AdmissionPermit};
use crate::state::AppState;

/// GET /api/ws
///
/// Admission is checked before the upgrade so a refused peer costs nothing
/// beyond the handshake. Any origin is accepted; admission gating and
/// sandbox isolation are the security boundary here.
pub async fn stream_upgrade(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let peer = peer_identity(&headers, remote);
    let Some(permit) = state.admission.try_acquire(&peer) else {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    };

    debug!(peer = %peer, "stream connection accepted");
    ws.on_upgrade(move |socket| handle_socket(socket, state, permit))
}

async fn handle_socket(socket: WebSocket, state: AppState, permit: AdmissionPermit) {
    // Held for the whole connection; dropping it releases the slot.
    let _permit = permit;

    let (mut sink, mut source) = socket.split();
    let (in_tx, in_rx) = mpsc::channel::<InboundFrame>(32);
    let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(32);

    // Socket reader: text frames -> session. Ends on disconnect or on a
    // frame that is not valid protocol JSON, both of which the session
    // observes as the client going away.
    let reader = tokio::spawn(async move {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let Ok(frame) = serde_json::from_str::<InboundFrame>(text.as_str()) else {
                        break;
                    };
                    if in_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    let limits = state.config.limits;
    let session = tokio::spawn(run_session(in_rx, out_tx, limits, state.exec_mode));

    // Socket writer: session -> client. Ends when the session closes its
    // sender (after Exit/Error) or the client stops accepting frames.
    while let Some(frame) = out_rx.recv().await {
        let Ok(text) = serde_json::to_string(&frame) else {
            continue;
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
    // Dropping the receiver makes any further session sends fail fast; the
    // session treats that as the client being gone.
    drop(out_rx);

    let _ = sink.close().await;
    let _ = session.await;
    reader.abort();
}

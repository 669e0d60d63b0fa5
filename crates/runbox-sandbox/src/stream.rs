//! Long-lived full-duplex stream sessions
//!
//! A session is driven entirely through two channels of frames; the
//! transport (WebSocket or otherwise) is bridged outside this module. Four
//! tasks cooperate per session: one pump per output pipe, one consumer for
//! inbound frames, and the supervisor awaiting sandbox exit. They share only
//! the cancellation token; output bytes travel through the sandbox's pipes,
//! never through an in-memory queue.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use runbox_core::config::Limits;
use runbox_core::language::Language;
use runbox_core::protocol::{InboundFrame, OutboundFrame};

use crate::output::CapGate;
use crate::spawn::{ExecMode, Sandbox, SandboxPipes};
use crate::workspace::Workspace;

/// Read size for the bytes-to-frames conversion. Small enough that slow
/// clients exert backpressure on the sandbox instead of buffering.
const FRAME_READ_BYTES: usize = 1024;

/// Drive one stream session to completion.
///
/// The first inbound frame must be `Init`; anything else yields a single
/// `Error` frame and termination. `Exit` is emitted only after both output
/// pumps have observed end-of-stream and is always the last frame. A closed
/// inbound channel (client gone) cancels the sandbox; the resulting `Exit`
/// send simply fails and no frame reaches anyone.
pub async fn run_session(
    mut inbound: mpsc::Receiver<InboundFrame>,
    outbound: mpsc::Sender<OutboundFrame>,
    limits: Limits,
    mode: ExecMode,
) {
    let session = Uuid::new_v4();

    let (language, code) = match inbound.recv().await {
        Some(InboundFrame::Init { language, code }) => (language, code),
        Some(_) => {
            send_error(&outbound, "expected init message").await;
            return;
        }
        None => return,
    };

    let Some(language) = Language::from_tag(&language) else {
        send_error(&outbound, "unsupported language").await;
        return;
    };

    if code.len() > limits.max_code_bytes {
        send_error(&outbound, "code exceeds size limit").await;
        return;
    }

    info!(session = %session, language = language.tag(), "stream session started");

    let spec = language.spec();
    let workspace = match Workspace::create(spec.source_name, &code) {
        Ok(ws) => ws,
        Err(e) => {
            send_error(&outbound, &e.to_string()).await;
            return;
        }
    };

    let spawned = Sandbox::spawn(language, mode, workspace.path(), limits.stream_deadline);
    let (mut sandbox, pipes) = match spawned {
        Ok(pair) => pair,
        Err(e) => {
            warn!(session = %session, error = %e, "stream spawn failed");
            send_error(&outbound, &e.to_string()).await;
            return;
        }
    };
    let SandboxPipes {
        stdin,
        stdout,
        stderr,
    } = pipes;
    let cancel = sandbox.cancel_token();

    let stdout_pump = tokio::spawn(pump_frames(
        stdout,
        outbound.clone(),
        limits.max_output_bytes,
        |data| OutboundFrame::Stdout { data },
    ));
    let stderr_pump = tokio::spawn(pump_frames(
        stderr,
        outbound.clone(),
        limits.max_output_bytes,
        |data| OutboundFrame::Stderr { data },
    ));
    let consumer = tokio::spawn(consume_inbound(inbound, stdin, cancel.clone()));

    // Supervisor: await exit, then drain both pumps so every preceding
    // output frame is on the wire before Exit.
    let status = sandbox.wait().await;
    let _ = stdout_pump.await;
    let _ = stderr_pump.await;

    let exit_code = match &status {
        Ok(s) => s.code().unwrap_or(-1),
        Err(_) => -1,
    };
    let _ = outbound.send(OutboundFrame::Exit { code: exit_code }).await;

    info!(session = %session, exit_code, "stream session finished");

    // Unblocks the consumer if the client is still connected and idle.
    cancel.cancel();
    let _ = consumer.await;
}

async fn send_error(outbound: &mpsc::Sender<OutboundFrame>, message: &str) {
    let _ = outbound
        .send(OutboundFrame::Error {
            data: message.to_string(),
        })
        .await;
}

/// Forward one output pipe as frames until EOF. Past the byte budget the
/// pipe is still drained, but nothing more is forwarded; the session must
/// not deadlock trying to deliver capped output.
async fn pump_frames<R, F>(
    mut pipe: R,
    outbound: mpsc::Sender<OutboundFrame>,
    cap: usize,
    make: F,
) where
    R: AsyncRead + Unpin,
    F: Fn(String) -> OutboundFrame,
{
    let mut gate = CapGate::new(cap);
    let mut chunk = [0u8; FRAME_READ_BYTES];
    let mut client_gone = false;
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if client_gone {
                    continue;
                }
                let admitted = gate.admit(&chunk[..n]);
                if admitted.is_empty() {
                    continue;
                }
                let data = String::from_utf8_lossy(admitted).into_owned();
                if outbound.send(make(data)).await.is_err() {
                    // Keep draining so the sandbox is not blocked on a full
                    // pipe while cancellation tears it down.
                    client_gone = true;
                }
            }
        }
    }
}

/// Dispatch inbound frames: stdin bytes to the sandbox in client-send
/// order, `Eof` closes the pipe, `Kill` cancels. A closed channel means the
/// client disconnected, which cancels as well.
async fn consume_inbound<W>(
    mut inbound: mpsc::Receiver<InboundFrame>,
    stdin: W,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut stdin = Some(stdin);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            frame = inbound.recv() => match frame {
                Some(InboundFrame::Stdin { data }) => {
                    if let Some(pipe) = stdin.as_mut() {
                        if pipe.write_all(data.as_bytes()).await.is_err() {
                            stdin = None;
                        }
                    }
                }
                Some(InboundFrame::Eof) => {
                    if let Some(mut pipe) = stdin.take() {
                        let _ = pipe.shutdown().await;
                    }
                }
                Some(InboundFrame::Kill) => {
                    cancel.cancel();
                    return;
                }
                // A second init has nowhere to go; ignore it.
                Some(InboundFrame::Init { .. }) => {}
                None => {
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runbox_core::config::Limits;

    fn channels() -> (
        mpsc::Sender<InboundFrame>,
        mpsc::Receiver<InboundFrame>,
        mpsc::Sender<OutboundFrame>,
        mpsc::Receiver<OutboundFrame>,
    ) {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        (in_tx, in_rx, out_tx, out_rx)
    }

    #[tokio::test]
    async fn first_frame_must_be_init() {
        let (in_tx, in_rx, out_tx, mut out_rx) = channels();

        in_tx
            .send(InboundFrame::Stdin { data: "hi".into() })
            .await
            .unwrap();

        run_session(in_rx, out_tx, Limits::default(), ExecMode::Native).await;

        assert_eq!(
            out_rx.recv().await,
            Some(OutboundFrame::Error {
                data: "expected init message".into()
            })
        );
        // Session terminated: no further frames.
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn init_with_unknown_language_errors() {
        let (in_tx, in_rx, out_tx, mut out_rx) = channels();

        in_tx
            .send(InboundFrame::Init {
                language: "cobol".into(),
                code: "".into(),
            })
            .await
            .unwrap();

        run_session(in_rx, out_tx, Limits::default(), ExecMode::Native).await;

        assert_eq!(
            out_rx.recv().await,
            Some(OutboundFrame::Error {
                data: "unsupported language".into()
            })
        );
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn oversized_init_code_errors() {
        let (in_tx, in_rx, out_tx, mut out_rx) = channels();
        let limits = Limits::default();

        in_tx
            .send(InboundFrame::Init {
                language: "python".into(),
                code: "x".repeat(limits.max_code_bytes + 1),
            })
            .await
            .unwrap();

        run_session(in_rx, out_tx, limits, ExecMode::Native).await;

        assert_eq!(
            out_rx.recv().await,
            Some(OutboundFrame::Error {
                data: "code exceeds size limit".into()
            })
        );
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn disconnect_before_init_is_silent() {
        let (in_tx, in_rx, out_tx, mut out_rx) = channels();
        drop(in_tx);

        run_session(in_rx, out_tx, Limits::default(), ExecMode::Native).await;

        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn stdin_after_eof_is_discarded() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (sink, mut source) = tokio::io::duplex(256);
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(consume_inbound(in_rx, sink, cancel.clone()));

        in_tx
            .send(InboundFrame::Stdin { data: "kept".into() })
            .await
            .unwrap();
        in_tx.send(InboundFrame::Eof).await.unwrap();
        in_tx
            .send(InboundFrame::Stdin {
                data: "dropped".into(),
            })
            .await
            .unwrap();
        in_tx.send(InboundFrame::Kill).await.unwrap();
        consumer.await.unwrap();
        assert!(cancel.is_cancelled());

        let mut received = Vec::new();
        source.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"kept");
    }

    #[tokio::test]
    async fn client_disconnect_cancels() {
        let (in_tx, in_rx) = mpsc::channel::<InboundFrame>(8);
        let (sink, _source) = tokio::io::duplex(256);
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(consume_inbound(in_rx, sink, cancel.clone()));
        drop(in_tx);
        consumer.await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn pump_stops_forwarding_past_cap_but_drains() {
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let data = vec![b'a'; 3000];

        pump_frames(&data[..], out_tx, 1500, |data| OutboundFrame::Stdout {
            data,
        })
        .await;

        let mut forwarded = 0;
        while let Some(frame) = out_rx.recv().await {
            match frame {
                OutboundFrame::Stdout { data } => forwarded += data.len(),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(forwarded, 1500);
    }

    #[tokio::test]
    async fn pump_preserves_byte_order() {
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let data = b"first second third".to_vec();

        pump_frames(&data[..], out_tx, 1024, |data| OutboundFrame::Stdout {
            data,
        })
        .await;

        let mut assembled = String::new();
        while let Some(OutboundFrame::Stdout { data }) = out_rx.recv().await {
            assembled.push_str(&data);
        }
        assert_eq!(assembled, "first second third");
    }
}

//! One-shot batch execution

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use uuid::Uuid;

use runbox_core::config::Limits;
use runbox_core::language::Language;

use crate::error::ExecResult;
use crate::output::CappedBuffer;
use crate::spawn::{ExecMode, Sandbox, SandboxPipes};
use crate::workspace::Workspace;

/// Captured result of a batch execution.
///
/// `success` is false for nonzero user exits, timeouts, and sandbox
/// failures alike; the distinction is carried by `stderr`.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Execute `code` once: write it to a fresh workspace, run it in a sandbox
/// under the language's deadline, feed `stdin` in one shot, and collect
/// capped stdout/stderr.
pub async fn execute(
    language: Language,
    code: &str,
    stdin: &str,
    limits: &Limits,
    mode: ExecMode,
) -> ExecResult<BatchOutcome> {
    let session = Uuid::new_v4();
    let spec = language.spec();

    debug!(session = %session, language = language.tag(), "batch execution started");

    let workspace = Workspace::create(spec.source_name, code)?;
    let (mut sandbox, pipes) = Sandbox::spawn(language, mode, workspace.path(), spec.deadline)?;
    let SandboxPipes {
        stdin: mut sink,
        stdout,
        stderr,
    } = pipes;

    // Feed the whole input and close the pipe. Runs as its own task so a
    // program that never reads stdin cannot wedge the session; once the
    // process dies the write fails and the task ends.
    let input = stdin.as_bytes().to_vec();
    let feeder = tokio::spawn(async move {
        let _ = sink.write_all(&input).await;
        let _ = sink.shutdown().await;
    });

    let (status, out_buf, err_buf) = tokio::join!(
        sandbox.wait(),
        collect_capped(stdout, limits.max_output_bytes),
        collect_capped(stderr, limits.max_output_bytes),
    );
    let _ = feeder.await;

    let timed_out = sandbox.cancelled();
    let success = !timed_out && matches!(&status, Ok(s) if s.success());

    let stdout = out_buf.into_string();
    let mut stderr = err_buf.into_string();

    // The client always sees non-empty diagnostics on failure.
    if stderr.is_empty() {
        if timed_out {
            stderr = format!("process timed out after {}s", spec.deadline.as_secs());
        } else if let Err(e) = &status {
            stderr = format!("sandbox failure: {e}");
        }
    }

    info!(
        session = %session,
        language = language.tag(),
        success,
        timed_out,
        stdout_bytes = stdout.len(),
        "batch execution finished"
    );

    Ok(BatchOutcome {
        stdout,
        stderr,
        success,
    })
}

/// Drain a pipe into a capped buffer until EOF.
async fn collect_capped<R: AsyncRead + Unpin>(mut pipe: R, cap: usize) -> CappedBuffer {
    let mut buf = CappedBuffer::new(cap);
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => {
                buf.write(&chunk[..n]);
            }
        }
    }
}

//! Sandbox spawning
//!
//! Translates a (language, workspace, deadline) triple into a running
//! process with captured pipes. In container mode the process runs under the
//! full isolation contract: no network, memory and pid ceilings, read-only
//! root, dropped capabilities, file ulimits, and the workspace bind-mounted
//! as the working directory. Native mode is a fallback for hosts without a
//! container runtime and only supports interpreted languages.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use runbox_core::language::{Language, LanguageSpec};

use crate::error::{ExecError, ExecResult};

/// How sandboxes are realized on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Hardened container per execution.
    Container,
    /// Direct interpreter invocation; interpreted languages only.
    Native,
}

/// Probe the container runtime once at startup.
pub async fn probe_container_runtime() -> bool {
    Command::new("docker")
        .arg("info")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// The container argv, isolation contract included verbatim.
fn container_args(spec: &LanguageSpec, workspace: &Path) -> Vec<String> {
    // Compiled languages get a higher CPU share to absorb the build step.
    let cpus = if spec.compile.is_some() { "2.0" } else { "1.0" };

    let mut args: Vec<String> = [
        "run",
        "--rm",
        "-i",
        "--network=none",
        "--memory=256m",
        "--memory-swap=256m",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("--cpus={}", cpus));
    args.extend(
        [
            "--pids-limit=128",
            "--read-only",
            "--cap-drop=ALL",
            "--security-opt",
            "no-new-privileges",
            "--ulimit",
            "fsize=10485760:10485760",
            "--ulimit",
            "nofile=256:256",
            "--tmpfs",
            "/tmp:rw,exec,size=64m",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push("-v".to_string());
    args.push(format!("{}:/app:rw", workspace.display()));
    args.push("-w".to_string());
    args.push("/app".to_string());
    args.push(spec.image.to_string());
    args.push("sh".to_string());
    args.push("-c".to_string());
    args.push(spec.shell_command());

    args
}

fn container_command(spec: &LanguageSpec, workspace: &Path) -> Command {
    let mut cmd = Command::new("docker");
    cmd.args(container_args(spec, workspace));
    cmd
}

fn native_command(language: Language, workspace: &Path) -> ExecResult<Command> {
    let spec = language.spec();
    let interpreter = match language {
        Language::Python => "python3",
        Language::Javascript => "node",
        _ => return Err(ExecError::SandboxUnavailable(language.tag())),
    };

    let mut cmd = Command::new(interpreter);
    cmd.arg(workspace.join(spec.source_name));
    cmd.current_dir(workspace);
    Ok(cmd)
}

/// Captured stdio of a spawned sandbox.
pub struct SandboxPipes {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Handle to a running sandbox process.
///
/// The deadline is enforced by a cancellation token: a watchdog trips it
/// after the given duration, and a tripped token makes [`Sandbox::wait`]
/// terminate the process unconditionally. `cancel` trips the same token for
/// user-initiated kills.
pub struct Sandbox {
    child: Child,
    cancel: CancellationToken,
}

impl Sandbox {
    pub fn spawn(
        language: Language,
        mode: ExecMode,
        workspace: &Path,
        deadline: Duration,
    ) -> ExecResult<(Sandbox, SandboxPipes)> {
        let spec = language.spec();
        let mut cmd = match mode {
            ExecMode::Container => container_command(spec, workspace),
            ExecMode::Native => native_command(language, workspace)?,
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(language = language.tag(), mode = ?mode, "spawning sandbox");

        let mut child = cmd.spawn().map_err(ExecError::Spawn)?;

        let pipes = SandboxPipes {
            stdin: child
                .stdin
                .take()
                .ok_or_else(|| ExecError::Spawn(std::io::Error::other("stdin not captured")))?,
            stdout: child
                .stdout
                .take()
                .ok_or_else(|| ExecError::Spawn(std::io::Error::other("stdout not captured")))?,
            stderr: child
                .stderr
                .take()
                .ok_or_else(|| ExecError::Spawn(std::io::Error::other("stderr not captured")))?,
        };

        let cancel = CancellationToken::new();
        let watchdog = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watchdog.cancelled() => {}
                _ = tokio::time::sleep(deadline) => watchdog.cancel(),
            }
        });

        Ok((Sandbox { child, cancel }, pipes))
    }

    /// Wait for the process to exit. A tripped cancellation token kills it
    /// first, so this always completes.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        tokio::select! {
            status = self.child.wait() => status,
            _ = self.cancel.cancelled() => {
                let _ = self.child.start_kill();
                self.child.wait().await
            }
        }
    }

    /// Unconditionally terminate the sandbox.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The session's deadline/cancel token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the run was ended by the deadline or an explicit kill rather
    /// than a natural exit.
    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        // Stops the watchdog; kill_on_drop reaps the process itself.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_for(language: Language) -> Vec<String> {
        container_args(language.spec(), &PathBuf::from("/tmp/runbox-test"))
    }

    #[test]
    fn isolation_contract_is_complete() {
        let args = args_for(Language::Python);
        for flag in [
            "--rm",
            "-i",
            "--network=none",
            "--memory=256m",
            "--memory-swap=256m",
            "--pids-limit=128",
            "--read-only",
            "--cap-drop=ALL",
            "no-new-privileges",
            "fsize=10485760:10485760",
            "nofile=256:256",
            "/tmp:rw,exec,size=64m",
        ] {
            assert!(
                args.iter().any(|a| a == flag),
                "missing isolation flag {flag}"
            );
        }
    }

    #[test]
    fn workspace_is_mounted_as_workdir() {
        let args = args_for(Language::Python);
        assert!(args.contains(&"/tmp/runbox-test:/app:rw".to_string()));
        let w = args.iter().position(|a| a == "-w").unwrap();
        assert_eq!(args[w + 1], "/app");
    }

    #[test]
    fn compiled_languages_get_more_cpu() {
        assert!(args_for(Language::Cpp).contains(&"--cpus=2.0".to_string()));
        assert!(args_for(Language::Python).contains(&"--cpus=1.0".to_string()));
    }

    #[test]
    fn run_expression_chains_compile_step() {
        let args = args_for(Language::Go);
        let sh = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[sh + 1], "go build -o /tmp/prog main.go && /tmp/prog");
        assert_eq!(args[sh - 1], "sh");
    }

    #[test]
    fn image_comes_from_the_registry() {
        let args = args_for(Language::Java);
        assert!(args.contains(&"runner-java".to_string()));
    }

    #[test]
    fn native_mode_rejects_compiled_languages() {
        let workspace = PathBuf::from("/tmp/runbox-test");
        assert!(native_command(Language::Go, &workspace).is_err());
        assert!(native_command(Language::Python, &workspace).is_ok());
    }
}

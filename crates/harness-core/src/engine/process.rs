use crate::config::ToolSpec;
use crate::errors::HarnessError;
use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// What the external tool left behind when it ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Real exit code; `-N` when the tool died from signal N.
    pub return_code: i32,
    /// Combined stdout+stderr in arrival order, lossily decoded and trimmed.
    pub output: String,
}

/// Runs one materialized script. `Ok` means the tool finished, whatever its exit code.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, script: &Path, timeout: Duration) -> Result<ToolOutput, HarnessError>;
}

/// Spawns the configured tool as an OS subprocess in its own process group.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tool: ToolSpec,
    kill_grace: Duration,
}

impl ProcessRunner {
    pub fn new(tool: ToolSpec, kill_grace: Duration) -> Self {
        Self { tool, kill_grace }
    }
}

#[async_trait]
impl ScriptExecutor for ProcessRunner {
    async fn execute(&self, script: &Path, timeout: Duration) -> Result<ToolOutput, HarnessError> {
        let mut cmd = Command::new(&self.tool.program);
        cmd.args(self.tool.argv(script))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: self.tool.program.clone(),
            source,
        })?;

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            terminate(&mut child, self.kill_grace).await;
            return Err(HarnessError::Io {
                context: "failed to capture tool output",
                path: script.to_path_buf(),
                source: std::io::Error::other("stdout/stderr pipe missing"),
            });
        };

        let mut combined = Vec::new();
        let capture = async {
            read_combined(&mut stdout, &mut stderr, &mut combined).await?;
            child.wait().await
        };
        let res = tokio::time::timeout(timeout, capture).await;

        match res {
            Ok(Ok(status)) => Ok(ToolOutput {
                return_code: exit_code(status),
                output: String::from_utf8_lossy(&combined).trim().to_string(),
            }),
            Ok(Err(source)) => {
                terminate(&mut child, self.kill_grace).await;
                Err(HarnessError::Io {
                    context: "failed to capture tool output",
                    path: script.to_path_buf(),
                    source,
                })
            }
            Err(_) => {
                terminate(&mut child, self.kill_grace).await;
                Err(HarnessError::Timeout(timeout))
            }
        }
    }
}

/// Drains both pipes into one buffer, chunks appended in the order they arrive.
async fn read_combined<O, E>(out: &mut O, err: &mut E, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_done = false;
    let mut err_done = false;
    let mut a = [0u8; 8192];
    let mut b = [0u8; 8192];

    while !(out_done && err_done) {
        tokio::select! {
            r = out.read(&mut a), if !out_done => match r? {
                0 => out_done = true,
                n => buf.extend_from_slice(&a[..n]),
            },
            r = err.read(&mut b), if !err_done => match r? {
                0 => err_done = true,
                n => buf.extend_from_slice(&b[..n]),
            },
        }
    }
    Ok(())
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return -sig;
        }
    }
    crate::model::SENTINEL_RC
}

/// Stops the child and everything it spawned: SIGTERM to the group, then SIGKILL once
/// the grace period runs out. Always reaps the child.
async fn terminate(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id() else {
        return;
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        signal_group(pid, Signal::SIGTERM);
        let exited = tokio::time::timeout(grace, child.wait()).await.is_ok();
        // sweep group members that outlived the leader
        signal_group(pid, Signal::SIGKILL);
        if exited {
            return;
        }
    }
    #[cfg(not(unix))]
    let _ = (pid, grace);

    if let Err(e) = child.start_kill() {
        tracing::debug!(event = "kill_failed", pid, error = %e);
    }
    let _ = child.wait().await;
}

#[cfg(unix)]
fn signal_group(pid: u32, sig: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), sig) {
        // ESRCH: group already gone
        tracing::trace!(event = "killpg", pid, signal = ?sig, error = %e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh() -> ProcessRunner {
        ProcessRunner::new(
            ToolSpec {
                program: "sh".into(),
                args: vec![],
            },
            Duration::from_millis(200),
        )
    }

    fn script(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let p = dir.path().join("s.sh");
        std::fs::write(&p, body).unwrap();
        p
    }

    #[tokio::test]
    async fn exit_code_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let p = script(&dir, "echo out\necho err 1>&2\nexit 7\n");
        let out = sh().execute(&p, Duration::from_secs(10)).await.unwrap();
        assert_eq!(out.return_code, 7);
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let p = script(&dir, "printf 'ok \\377\\376 done'\n");
        let out = sh().execute(&p, Duration::from_secs(10)).await.unwrap();
        assert_eq!(out.return_code, 0);
        assert!(out.output.starts_with("ok "));
        assert!(out.output.ends_with(" done"));
        assert!(out.output.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn timeout_kills_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let p = script(&dir, "sleep 30 &\nsleep 30\n");
        let start = Instant::now();
        let err = sh()
            .execute(&p, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Timeout(_)));
        assert!(err.log_body().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn sigterm_ignoring_child_is_force_killed() {
        let dir = tempfile::tempdir().unwrap();
        let p = script(&dir, "trap '' TERM\nwhile true; do sleep 1; done\n");
        let start = Instant::now();
        let err = sh()
            .execute(&p, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = script(&dir, "exit 0\n");
        let runner = ProcessRunner::new(
            ToolSpec {
                program: "/nonexistent/openroad".into(),
                args: vec!["-exit".into()],
            },
            Duration::from_millis(100),
        );
        let err = runner.execute(&p, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn signal_exit_is_negative() {
        let dir = tempfile::tempdir().unwrap();
        let p = script(&dir, "kill -9 $$\n");
        let out = sh().execute(&p, Duration::from_secs(10)).await.unwrap();
        assert_eq!(out.return_code, -9);
    }
}

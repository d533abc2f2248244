//! Command Executor (spec §4.1 / C1). Spawns and supervises an external CLI
//! process with a bounded timeout and caller cancellation. Never inspects
//! or interprets the command's output — that is the parser's job (C2).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Grace period given to a process after SIGTERM before it is force-killed.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl ExecRequest {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
            cwd: None,
            env: HashMap::new(),
            timeout,
        }
    }

    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ExecOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("`{program}` was cancelled")]
    Cancelled { program: String },
    #[error("`{program}` exited with a non-zero status")]
    Nonzero { program: String, output: ExecOutput },
}

/// Runs `request` to completion, honoring both `request.timeout` and
/// `cancel`. Exactly one process is spawned. On timeout or cancellation the
/// child is sent SIGTERM (via `kill_on_drop`/start_kill), given a short
/// grace period, then force-killed — no orphan survives any exit path.
pub async fn execute(request: ExecRequest, cancel: CancellationToken) -> Result<ExecOutput, ExecError> {
    let started = Instant::now();
    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args);
    cmd.envs(&request.env);
    if let Some(cwd) = &request.cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(if request.stdin.is_some() {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ExecError::SpawnFailed {
        program: request.program.clone(),
        source,
    })?;

    if let Some(bytes) = &request.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            // Best-effort: a script that doesn't read stdin will still run.
            let _ = stdin.write_all(bytes).await;
        }
    }

    tracing::debug!(program = %request.program, args = ?request.args, "spawned command");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            terminate(&mut child).await;
            Err(ExecError::Cancelled { program: request.program })
        }
        result = tokio::time::timeout(request.timeout, wait_with_output(&mut child)) => {
            match result {
                Ok(Ok(output)) => {
                    let exec_output = ExecOutput {
                        stdout: output.stdout,
                        stderr: output.stderr,
                        exit_code: output.status.code().unwrap_or(-1),
                        duration: started.elapsed(),
                    };
                    if !exec_output.success() {
                        tracing::warn!(
                            program = %request.program,
                            exit_code = exec_output.exit_code,
                            "command exited non-zero",
                        );
                        return Err(ExecError::Nonzero { program: request.program, output: exec_output });
                    }
                    Ok(exec_output)
                }
                Ok(Err(io_err)) => Err(ExecError::SpawnFailed { program: request.program, source: io_err }),
                Err(_elapsed) => {
                    tracing::warn!(program = %request.program, timeout = ?request.timeout, "command timed out");
                    Err(ExecError::TimedOut { program: request.program, timeout: request.timeout })
                }
            }
        }
    }
}

/// Equivalent to `tokio::process::Child::wait_with_output`, but takes the
/// child by mutable reference instead of by value so it can share ownership
/// of `child` with a sibling branch in a `tokio::select!` (e.g. cancellation).
async fn wait_with_output(child: &mut Child) -> std::io::Result<std::process::Output> {
    use futures::future::try_join3;

    async fn read_to_end<A: AsyncRead + Unpin>(io: &mut Option<A>) -> std::io::Result<Vec<u8>> {
        let mut vec = Vec::new();
        if let Some(io) = io.as_mut() {
            tokio::io::AsyncReadExt::read_to_end(io, &mut vec).await?;
        }
        Ok(vec)
    }

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_fut = read_to_end(&mut stdout_pipe);
    let stderr_fut = read_to_end(&mut stderr_pipe);

    let (status, stdout, stderr) = try_join3(child.wait(), stdout_fut, stderr_fut).await?;

    drop(stdout_pipe);
    drop(stderr_pipe);

    Ok(std::process::Output { status, stdout, stderr })
}

/// Sends a polite SIGTERM-equivalent (`start_kill`, which on unix is
/// SIGKILL via tokio — graceful shutdown beyond that is Slurm's own
/// responsibility for the spawned CLI), waits a grace period, then ensures
/// the process is gone.
async fn terminate(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
    let _ = tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await;
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_command() {
        let req = ExecRequest::new("echo", vec!["hello".into()], Duration::from_secs(5));
        let out = execute(req, CancellationToken::new()).await.unwrap();
        assert_eq!(out.stdout_string().trim(), "hello");
        assert!(out.success());
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_carrying_the_triple() {
        let req = ExecRequest::new("sh", vec!["-c".into(), "exit 3".into()], Duration::from_secs(5));
        let err = execute(req, CancellationToken::new()).await.unwrap_err();
        match err {
            ExecError::Nonzero { output, .. } => assert_eq!(output.exit_code, 3),
            other => panic!("expected Nonzero, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_reported_and_process_does_not_linger() {
        let req = ExecRequest::new("sleep", vec!["5".into()], Duration::from_millis(50));
        let err = execute(req, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExecError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn cancellation_token_aborts_the_command() {
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel2.cancel();
        });
        let req = ExecRequest::new("sleep", vec!["5".into()], Duration::from_secs(5));
        let err = execute(req, cancel).await.unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { .. }));
    }
}

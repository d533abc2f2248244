use std::time::Duration;

use async_trait::async_trait;
use domain::GatewayError;
use infrastructure::{execute, ExecError, ExecRequest};
use tokio_util::sync::CancellationToken;

use super::{BackendOutput, SlurmBackend};

/// Shells out to the real Slurm CLIs via the generic command executor (C1).
pub struct RealBackend;

#[async_trait]
impl SlurmBackend for RealBackend {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, GatewayError> {
        let request = ExecRequest::new(program, args.to_vec(), timeout);
        match execute(request, cancel.clone()).await {
            Ok(out) => Ok(BackendOutput {
                stdout: out.stdout_string(),
                stderr: out.stderr_string(),
                success: true,
            }),
            Err(ExecError::Nonzero { output, .. }) => Ok(BackendOutput {
                stdout: output.stdout_string(),
                stderr: output.stderr_string(),
                success: false,
            }),
            Err(ExecError::TimedOut { timeout, .. }) => Err(GatewayError::Timeout(timeout)),
            Err(ExecError::Cancelled { program }) => {
                Err(GatewayError::Internal(format!("`{program}` was cancelled")))
            }
            Err(ExecError::SpawnFailed { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(GatewayError::BackendUnavailable)
            }
            Err(ExecError::SpawnFailed { program, source }) => {
                Err(GatewayError::Internal(format!("failed to spawn `{program}`: {source}")))
            }
        }
    }

    fn is_real(&self) -> bool {
        true
    }
}

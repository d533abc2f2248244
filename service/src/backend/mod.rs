//! The seam between the Slurm Adapter (C4) and whatever actually runs a
//! Slurm CLI invocation — a real process (C1) or the in-memory substitute
//! (C3). The adapter's capability functions are written once against
//! [`SlurmBackend`] and exercise identical code for both modes (spec §4.3's
//! bit-structural-identity invariant).

pub mod mock;
pub mod real;

use std::time::Duration;

use async_trait::async_trait;
use domain::GatewayError;
use tokio_util::sync::CancellationToken;

pub use mock::MockBackend;
pub use real::RealBackend;

/// The raw text a Slurm CLI invocation produced. `success` mirrors the
/// process exit code (`== 0`); the adapter — never the backend — decides
/// what a non-zero exit means for a given command.
#[derive(Debug, Clone)]
pub struct BackendOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

#[async_trait]
pub trait SlurmBackend: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, GatewayError>;

    /// Whether this backend is talking to a real Slurm install. Surfaced
    /// verbatim as every tool response's `_meta.real_slurm` (spec §4.3).
    fn is_real(&self) -> bool;
}

//! Chooses between the real and mock Slurm backends exactly once at
//! startup (spec §4.3, §9: no re-probing on `BackendUnavailable`).

use std::sync::Arc;

use service::{MockBackend, RealBackend, SlurmBackend};

/// `sbatch` on `PATH` means a real Slurm install is reachable. This is the
/// only probe the gateway ever does; `SLURM_MOCK_FORCE=1` skips it entirely.
fn sbatch_on_path() -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| dir.join("sbatch").is_file()))
        .unwrap_or(false)
}

pub fn select(mock_force: bool, output_dir: std::path::PathBuf) -> Arc<dyn SlurmBackend> {
    if mock_force {
        tracing::info!("SLURM_MOCK_FORCE set; using the mock backend");
        return Arc::new(MockBackend::new(output_dir));
    }
    if sbatch_on_path() {
        tracing::info!("found `sbatch` on PATH; using the real backend");
        Arc::new(RealBackend)
    } else {
        tracing::info!("no `sbatch` on PATH; falling back to the mock backend");
        Arc::new(MockBackend::new(output_dir))
    }
}

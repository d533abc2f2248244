//! Pure, deterministic converters from Slurm CLI text output to typed
//! records (spec §4.2 / C2). None of these functions run a process; they
//! are exercised directly from fixture strings in their own tests.

pub mod kv;
pub mod sacct;
pub mod salloc;
pub mod sbatch;
pub mod sinfo;
pub mod squeue;

pub use kv::parse_kv_block;
pub use sacct::parse_sacct_state;
pub use salloc::{parse_salloc_stderr, SallocOutcome};
pub use sbatch::parse_sbatch_job_id;
pub use sinfo::{parse_sinfo, PartitionRow};
pub use squeue::{parse_squeue, SqueueRow};

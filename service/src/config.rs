use std::path::PathBuf;
use std::time::Duration;

/// Timeouts and policy knobs the adapter needs (spec §4.1's per-operation
/// budgets). Constructed once at startup from [`app`]'s configuration and
/// handed to every capability call by value.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub output_dir: PathBuf,
    pub query_timeout: Duration,
    pub submit_timeout: Duration,
    pub output_read_timeout: Duration,
    pub immediate_timeout: Duration,
    pub max_alloc_wait: Duration,
    pub max_output_bytes: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./logs/slurm_output"),
            query_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(60),
            output_read_timeout: Duration::from_secs(10),
            immediate_timeout: Duration::from_secs(10),
            max_alloc_wait: Duration::from_secs(300),
            max_output_bytes: 1024 * 1024,
        }
    }
}

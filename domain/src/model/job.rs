use std::sync::Arc;

use serde::Serialize;

/// A single Slurm job, real or mock. `state` only ever moves forward through
/// [`JobState`]'s order; once terminal it is immutable (spec §3 invariant).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Arc<str>,
    pub name: String,
    pub state: JobState,
    pub partition: String,
    pub user: String,
    pub nodelist: String,
    pub num_nodes: u32,
    pub num_cpus: u32,
    pub memory: String,
    pub time_limit: String,
    pub runtime_secs: u64,
    pub submit_time: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub exit_code: i32,
    pub script_path: String,
    pub stdout_path: String,
    pub stderr_path: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    /// Slurm's `CG` — transient, between Running and Completed. Coerces to
    /// Running for the monotonic state-machine invariant (spec §8).
    Completing,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    NodeFail,
    #[default]
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed
                | JobState::Failed
                | JobState::Cancelled
                | JobState::Timeout
                | JobState::NodeFail
        )
    }

    /// Normalizes a Slurm two/three-letter state code (`squeue -o "%T"`/`%t`
    /// output, and `sacct`'s long-form names) into a [`JobState`]. Unknown
    /// tokens become [`JobState::Unknown`] rather than failing (spec §4.2).
    pub fn from_slurm_code(code: &str) -> JobState {
        match code.trim().to_ascii_uppercase().as_str() {
            "PD" | "PENDING" => JobState::Pending,
            "R" | "RUNNING" => JobState::Running,
            "CG" | "COMPLETING" => JobState::Completing,
            "CD" | "COMPLETED" => JobState::Completed,
            "F" | "FAILED" | "BOOT_FAIL" | "OUT_OF_MEMORY" | "DEADLINE" => JobState::Failed,
            "CA" | "CANCELLED" => JobState::Cancelled,
            "TO" | "TIMEOUT" => JobState::Timeout,
            "NF" | "NODE_FAIL" => JobState::NodeFail,
            _ => JobState::Unknown,
        }
    }
}

impl Default for Job {
    fn default() -> Self {
        Self {
            id: Arc::from(String::new()),
            name: String::new(),
            state: JobState::default(),
            partition: String::new(),
            user: String::new(),
            nodelist: String::new(),
            num_nodes: 0,
            num_cpus: 0,
            memory: String::new(),
            time_limit: String::new(),
            runtime_secs: 0,
            submit_time: 0,
            start_time: 0,
            end_time: 0,
            exit_code: 0,
            script_path: String::new(),
            stdout_path: String::new(),
            stderr_path: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_codes_do_not_panic() {
        assert_eq!(JobState::from_slurm_code("XYZ"), JobState::Unknown);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for s in [
            JobState::Completed,
            JobState::Failed,
            JobState::Cancelled,
            JobState::Timeout,
            JobState::NodeFail,
        ] {
            assert!(s.is_terminal());
        }
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Completing.is_terminal());
    }
}

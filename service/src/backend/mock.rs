//! The Mock Slurm Backend (spec §4.3). Drop-in substitute for a real Slurm
//! install, invoked when no `sbatch` is on `PATH` (or `SLURM_MOCK_FORCE=1`).
//! Produces the exact same textual shapes the real CLIs would, so the
//! adapter's C2 parsers run unmodified against either backend.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use domain::model::job::JobState;
use domain::vo::array_range::ArrayRange;
use domain::GatewayError;
use infrastructure::{poll_until, PollOutcome};
use tokio_util::sync::CancellationToken;

use super::{BackendOutput, SlurmBackend};
use crate::paths;

const NODE_NAME: &str = "mock-node-0";
const NODE_CPUS: u32 = 4;
const NODE_MEMORY_MB: u64 = 16_384;
const PARTITIONS: [&str; 3] = ["debug", "normal", "compute"];
const DEFAULT_PARTITION: &str = "debug";

/// Delay before a freshly submitted batch job is considered RUNNING —
/// mirrors real Slurm's scheduling latency at a scale tests can wait out.
const TRANSITION_DELAY: Duration = Duration::from_millis(400);
const DEFAULT_RUNTIME: Duration = Duration::from_secs(2);
const ALLOC_POLL_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Batch,
    Allocation,
}

#[derive(Debug, Clone)]
struct MockJobEntry {
    kind: JobKind,
    name: String,
    partition: String,
    user: String,
    num_nodes: u32,
    num_cpus: u32,
    memory: String,
    time_limit: String,
    submitted_at: Instant,
    runtime: Duration,
    force_fail: bool,
    cancelled: bool,
    cores_reserved: u32,
}

/// In-memory cluster state: a monotonic job-id counter, a job/allocation
/// map keyed by id (array tasks keyed `"<array_id>_<task_id>"`), one
/// synthetic node, and three synthetic partitions (spec §4.3).
pub struct MockBackend {
    next_id: AtomicU64,
    jobs: DashMap<String, MockJobEntry>,
    cpus_in_use: AtomicU32,
    output_dir: PathBuf,
}

impl MockBackend {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: DashMap::new(),
            cpus_in_use: AtomicU32::new(0),
            output_dir,
        }
    }

    fn compute_state(entry: &MockJobEntry) -> JobState {
        if entry.cancelled {
            return JobState::Cancelled;
        }
        match entry.kind {
            JobKind::Allocation => JobState::Running,
            JobKind::Batch => {
                let elapsed = entry.submitted_at.elapsed();
                if elapsed < TRANSITION_DELAY {
                    JobState::Pending
                } else if elapsed < TRANSITION_DELAY + entry.runtime {
                    JobState::Running
                } else if entry.force_fail {
                    JobState::Failed
                } else {
                    JobState::Completed
                }
            }
        }
    }

    async fn ensure_output_written(&self, id: &str, entry: &MockJobEntry, state: JobState) {
        if matches!(state, JobState::Pending) {
            return;
        }
        let out_path = paths::stdout_path(&self.output_dir, id);
        let err_path = paths::stderr_path(&self.output_dir, id);
        if let Some(parent) = out_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if tokio::fs::metadata(&out_path).await.is_err() {
            let body = format!(
                "Hello from {} (mock)\nUSER={}\nPARTITION={}\nNODE={}\n",
                entry.name, entry.user, entry.partition, NODE_NAME
            );
            let _ = tokio::fs::write(&out_path, body).await;
        }
        if entry.force_fail && state.is_terminal() {
            if tokio::fs::metadata(&err_path).await.is_err() {
                let _ = tokio::fs::write(&err_path, "mock: forced failure via script prefix\n").await;
            }
        } else if tokio::fs::metadata(&err_path).await.is_err() {
            let _ = tokio::fs::write(&err_path, "").await;
        }
    }

    async fn touch(&self, id: &str) -> Option<(MockJobEntry, JobState)> {
        let entry = self.jobs.get(id)?.clone();
        let state = Self::compute_state(&entry);
        self.ensure_output_written(id, &entry, state).await;
        Some((entry, state))
    }

    fn try_reserve(&self, cores: u32) -> bool {
        loop {
            let current = self.cpus_in_use.load(Ordering::SeqCst);
            if current + cores > NODE_CPUS {
                return false;
            }
            if self
                .cpus_in_use
                .compare_exchange(current, current + cores, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    async fn handle_sbatch(&self, args: &[String]) -> Result<BackendOutput, GatewayError> {
        let cpus = arg_value(args, "--cpus-per-task").and_then(|v| v.parse().ok()).unwrap_or(1);
        let memory = arg_value(args, "--mem").unwrap_or("1G").to_string();
        let time_limit = arg_value(args, "--time").unwrap_or("01:00:00").to_string();
        let job_name = arg_value(args, "--job-name").unwrap_or("job").to_string();
        let partition = arg_value(args, "--partition").unwrap_or(DEFAULT_PARTITION).to_string();
        let script_path = args.last().cloned().unwrap_or_default();
        let force_fail = Path::new(&script_path)
            .file_name()
            .map(|f| f.to_string_lossy().starts_with("fail_"))
            .unwrap_or(false);
        let runtime = detect_runtime(&script_path);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let entry = MockJobEntry {
            kind: JobKind::Batch,
            name: job_name,
            partition,
            user: "mockuser".to_string(),
            num_nodes: 1,
            num_cpus: cpus,
            memory,
            time_limit,
            submitted_at: Instant::now(),
            runtime,
            force_fail,
            cancelled: false,
            cores_reserved: 0,
        };

        if let Some(range_raw) = arg_value(args, "--array") {
            let range = ArrayRange::parse(range_raw)?;
            for task in range.tasks() {
                self.jobs.insert(paths::array_task_id(&id, *task), entry.clone());
            }
        } else {
            self.jobs.insert(id.clone(), entry);
        }

        Ok(BackendOutput {
            stdout: format!("Submitted batch job {id}\n"),
            stderr: String::new(),
            success: true,
        })
    }

    fn handle_squeue(&self, args: &[String]) -> BackendOutput {
        let id_filter = arg_value(args, "-j").map(|s| s.to_string());
        let user_filter = arg_value(args, "-u").map(|s| s.to_string());

        let mut rows = Vec::new();
        for entry_ref in self.jobs.iter() {
            let id = entry_ref.key();
            if let Some(ref wanted) = id_filter {
                if id != wanted {
                    continue;
                }
            }
            let entry = entry_ref.value();
            if let Some(ref user) = user_filter {
                if &entry.user != user {
                    continue;
                }
            }
            let state = Self::compute_state(entry);
            if state.is_terminal() {
                continue; // real squeue drops jobs once they leave the queue
            }
            let nodelist = if matches!(state, JobState::Running) { NODE_NAME } else { "" };
            rows.push(format!(
                "{id}|{}|{}|{}|00:00:00|{}|{}|{}|{}|None|{nodelist}\n",
                state_code(state),
                entry.name,
                entry.user,
                entry.time_limit,
                entry.num_nodes,
                entry.num_cpus,
                entry.partition,
            ));
        }
        BackendOutput {
            stdout: rows.concat(),
            stderr: String::new(),
            success: true,
        }
    }

    async fn handle_sacct(&self, args: &[String]) -> BackendOutput {
        let Some(id) = arg_value(args, "-j") else {
            return BackendOutput { stdout: String::new(), stderr: String::new(), success: true };
        };
        match self.touch(id).await {
            Some((_, state)) => BackendOutput {
                stdout: format!("{}\n", state_code(state)),
                stderr: String::new(),
                success: true,
            },
            None => BackendOutput {
                stdout: String::new(),
                stderr: format!("sacct: error: couldn't find job {id}\n"),
                success: false,
            },
        }
    }

    async fn handle_scontrol(&self, args: &[String]) -> BackendOutput {
        match (args.first().map(String::as_str), args.get(1).map(String::as_str), args.get(2)) {
            (Some("show"), Some("job"), Some(id)) => self.handle_scontrol_show_job(id).await,
            (Some("show"), Some("node"), Some(name)) => self.handle_scontrol_show_node(name),
            // `scontrol show node` with no name lists every node; the mock
            // only ever has the one synthetic node.
            (Some("show"), Some("node"), None) => self.handle_scontrol_show_node(NODE_NAME),
            _ => BackendOutput {
                stdout: String::new(),
                stderr: "scontrol: error: unrecognized invocation\n".to_string(),
                success: false,
            },
        }
    }

    async fn handle_scontrol_show_job(&self, id: &str) -> BackendOutput {
        let Some((entry, state)) = self.touch(id).await else {
            return BackendOutput {
                stdout: String::new(),
                stderr: format!("scontrol: error: Invalid job id specified: {id}\n"),
                success: false,
            };
        };
        let out_path = paths::stdout_path(&self.output_dir, id);
        let err_path = paths::stderr_path(&self.output_dir, id);
        let nodelist = if matches!(state, JobState::Running | JobState::Completing) {
            NODE_NAME
        } else {
            ""
        };
        let exit_code = if matches!(state, JobState::Failed) { "1:0" } else { "0:0" };
        let kv = format!(
            "JobId={id} JobName={} UserId={}(1000) JobState={} Partition={} \
             NumNodes={} NumCPUs={} NodeList={nodelist} RunTime=00:00:05 TimeLimit={} \
             SubmitTime=1970-01-01T00:00:00 StartTime=1970-01-01T00:00:00 \
             EndTime=Unknown ExitCode={exit_code} WorkDir=/tmp StdOut={} StdErr={}\n",
            entry.name,
            entry.user,
            state_code(state),
            entry.partition,
            entry.num_nodes,
            entry.num_cpus,
            entry.time_limit,
            out_path.display(),
            err_path.display(),
        );
        BackendOutput { stdout: kv, stderr: String::new(), success: true }
    }

    fn handle_scontrol_show_node(&self, name: &str) -> BackendOutput {
        if name != NODE_NAME {
            return BackendOutput {
                stdout: String::new(),
                stderr: format!("scontrol: error: Node {name} not found\n"),
                success: false,
            };
        }
        let used = self.cpus_in_use.load(Ordering::SeqCst);
        let kv = format!(
            "NodeName={NODE_NAME} State={} CPUTot={NODE_CPUS} CPUAlloc={used} RealMemory={NODE_MEMORY_MB} Features=mock\n",
            if used == 0 { "IDLE" } else if used >= NODE_CPUS { "ALLOCATED" } else { "MIXED" },
        );
        BackendOutput { stdout: kv, stderr: String::new(), success: true }
    }

    fn handle_sinfo(&self, args: &[String]) -> BackendOutput {
        if args.iter().any(|a| a == "--version") {
            return BackendOutput {
                stdout: "slurm-mock 23.11.0\n".to_string(),
                stderr: String::new(),
                success: true,
            };
        }
        let used = self.cpus_in_use.load(Ordering::SeqCst);
        let state = if used == 0 { "idle" } else if used >= NODE_CPUS { "alloc" } else { "mix" };
        let mut rows = String::new();
        for (i, name) in PARTITIONS.iter().enumerate() {
            let marker = if i == 0 { "*" } else { "" };
            rows.push_str(&format!("{name}{marker}|up|1-00:00:00|1|{state}|{NODE_NAME}\n"));
        }
        BackendOutput { stdout: rows, stderr: String::new(), success: true }
    }

    fn handle_scancel(&self, args: &[String]) -> BackendOutput {
        let Some(id) = args.last() else {
            return BackendOutput { stdout: String::new(), stderr: "scancel: error: missing job id\n".into(), success: false };
        };
        let Some(mut entry) = self.jobs.get_mut(id) else {
            return BackendOutput {
                stdout: String::new(),
                stderr: format!("scancel: error: Kill job error on job id {id}: Invalid job id specified\n"),
                success: false,
            };
        };
        if !entry.cancelled {
            entry.cancelled = true;
            if entry.kind == JobKind::Allocation {
                self.cpus_in_use.fetch_sub(entry.cores_reserved.min(self.cpus_in_use.load(Ordering::SeqCst)), Ordering::SeqCst);
            }
        }
        BackendOutput { stdout: String::new(), stderr: String::new(), success: true }
    }

    async fn handle_salloc(
        &self,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, GatewayError> {
        let nodes = arg_value(args, "--nodes").and_then(|v| v.parse().ok()).unwrap_or(1);
        let cores = arg_value(args, "--ntasks").and_then(|v| v.parse().ok()).unwrap_or(1u32);
        let partition = arg_value(args, "--partition").unwrap_or(DEFAULT_PARTITION).to_string();
        let job_name = arg_value(args, "--job-name").unwrap_or("allocation").to_string();
        let memory = arg_value(args, "--mem").unwrap_or("1G").to_string();
        let time_limit = arg_value(args, "--time").unwrap_or("01:00:00").to_string();

        if !PARTITIONS.contains(&partition.as_str()) {
            return Ok(BackendOutput {
                stdout: String::new(),
                stderr: "salloc: error: Job submit/allocate failed: invalid partition specified\n".to_string(),
                success: false,
            });
        }

        let outcome: PollOutcome<()> = poll_until(ALLOC_POLL_INTERVAL, timeout, cancel, || {
            let granted = self.try_reserve(cores);
            async move {
                if granted {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Done(()) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
                self.jobs.insert(
                    id.clone(),
                    MockJobEntry {
                        kind: JobKind::Allocation,
                        name: job_name,
                        partition,
                        user: "mockuser".to_string(),
                        num_nodes: nodes,
                        num_cpus: cores,
                        memory,
                        time_limit,
                        submitted_at: Instant::now(),
                        runtime: Duration::ZERO,
                        force_fail: false,
                        cancelled: false,
                        cores_reserved: cores,
                    },
                );
                Ok(BackendOutput {
                    stdout: String::new(),
                    stderr: format!("salloc: Granted job allocation {id}\n"),
                    success: true,
                })
            }
            PollOutcome::DeadlineExceeded => Err(GatewayError::Timeout(timeout)),
            PollOutcome::Cancelled => Err(GatewayError::Internal("allocation request cancelled".to_string())),
        }
    }
}

#[async_trait]
impl SlurmBackend for MockBackend {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, GatewayError> {
        match program {
            "sbatch" => self.handle_sbatch(args).await,
            "squeue" => Ok(self.handle_squeue(args)),
            "sacct" => Ok(self.handle_sacct(args).await),
            "scontrol" => Ok(self.handle_scontrol(args).await),
            "sinfo" => Ok(self.handle_sinfo(args)),
            "scancel" => Ok(self.handle_scancel(args)),
            "salloc" => self.handle_salloc(args, timeout, cancel).await,
            other => Err(GatewayError::Internal(format!("mock backend has no handler for `{other}`"))),
        }
    }

    fn is_real(&self) -> bool {
        false
    }
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{key}=");
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn state_code(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "PENDING",
        JobState::Running => "RUNNING",
        JobState::Completing => "COMPLETING",
        JobState::Completed => "COMPLETED",
        JobState::Failed => "FAILED",
        JobState::Cancelled => "CANCELLED",
        JobState::Timeout => "TIMEOUT",
        JobState::NodeFail => "NODE_FAIL",
        JobState::Unknown => "UNKNOWN",
    }
}

/// A script named like `sleepN.sh` simulates an `N`-second run; anything
/// else uses the default. Keeps end-to-end tests fast without special-casing
/// the adapter.
fn detect_runtime(script_path: &str) -> Duration {
    let stem = Path::new(script_path).file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    if let Some(digits) = stem.strip_prefix("sleep").filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit())) {
        if let Ok(secs) = digits.parse::<u64>() {
            return Duration::from_secs(secs.min(5));
        }
    }
    DEFAULT_RUNTIME
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MockBackend {
        MockBackend::new(std::env::temp_dir().join(format!("mock-test-{}", std::process::id())))
    }

    #[tokio::test]
    async fn submit_then_list_shows_pending_or_running() {
        let backend = backend();
        let cancel = CancellationToken::new();
        let out = backend
            .run("sbatch", &["--cpus-per-task=1".into(), "ok.sh".into()], Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert!(out.stdout.starts_with("Submitted batch job "));

        let squeue_out = backend
            .run("squeue", &["-h".into()], Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert!(squeue_out.stdout.contains("PENDING") || squeue_out.stdout.contains("RUNNING"));
    }

    #[tokio::test]
    async fn sinfo_version_is_a_bare_version_string() {
        let backend = backend();
        let cancel = CancellationToken::new();
        let out = backend
            .run("sinfo", &["--version".into()], Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert!(out.success);
        assert!(out.stdout.starts_with("slurm-mock"));
        assert!(!out.stdout.contains('|'));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let backend = backend();
        let cancel = CancellationToken::new();
        let submitted = backend
            .run("sbatch", &["ok.sh".into()], Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        let id = submitted.stdout.trim_start_matches("Submitted batch job ").trim().to_string();

        let first = backend.run("scancel", &[id.clone()], Duration::from_secs(5), &cancel).await.unwrap();
        assert!(first.success);
        let second = backend.run("scancel", &[id], Duration::from_secs(5), &cancel).await.unwrap();
        assert!(second.success);
    }

    #[tokio::test]
    async fn allocate_nodes_immediate_timeout_under_saturation() {
        let backend = backend();
        let cancel = CancellationToken::new();
        // saturate all 4 cpus with one allocation
        backend
            .run("salloc", &["--nodes=1".into(), "--ntasks=4".into(), "--immediate".into()], Duration::from_secs(2), &cancel)
            .await
            .unwrap();

        let started = Instant::now();
        let err = backend
            .run(
                "salloc",
                &["--nodes=1".into(), "--ntasks=1".into(), "--immediate".into()],
                Duration::from_millis(500),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unknown_partition_is_rejected_without_blocking() {
        let backend = backend();
        let cancel = CancellationToken::new();
        let out = backend
            .run("salloc", &["--partition=bogus".into()], Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("invalid partition"));
    }
}

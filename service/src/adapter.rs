//! The Slurm Adapter (C4): the only place in the crate that knows how to
//! turn a capability call into Slurm CLI arguments and a capability result
//! back out of Slurm CLI text. Every method here runs unmodified against a
//! real or mock [`SlurmBackend`] (spec §4.4).

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use domain::model::{Allocation, AllocationState, ClusterInfo, Job, JobState, Node, Partition};
use domain::parse::{
    parse_kv_block, parse_sacct_state, parse_salloc_stderr, parse_sbatch_job_id, parse_sinfo, parse_squeue,
    PartitionRow, SallocOutcome, SqueueRow,
};
use domain::vo::array_range::ArrayRange;
use domain::vo::memory_spec::MemorySpec;
use domain::vo::time_limit::TimeLimit;
use domain::{model::ArrayJob, GatewayError};
use infrastructure::{poll_until, PollOutcome};
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::backend::{BackendOutput, SlurmBackend};
use crate::config::AdapterConfig;
use crate::paths;

/// `squeue -h -o "..."` field order the adapter always requests, matching
/// [`SqueueRow`]'s deserialize order exactly.
const SQUEUE_FORMAT: &str = "%i|%T|%j|%u|%M|%l|%D|%C|%P|%R|%N";
/// `sinfo -h -o "..."` field order, matching [`PartitionRow`].
const SINFO_FORMAT: &str = "%P|%a|%l|%D|%t|%N";
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(300);
const CANCEL_POLL_BUDGET: Duration = Duration::from_secs(5);

/// Which output stream [`SlurmAdapter::get_job_output`] should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct JobOutput {
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct SubmitJobRequest {
    pub script_path: String,
    pub cores: u32,
    #[builder(default, setter(strip_option))]
    pub memory: Option<String>,
    #[builder(default, setter(strip_option))]
    pub time_limit: Option<String>,
    #[builder(default, setter(strip_option))]
    pub job_name: Option<String>,
    #[builder(default, setter(strip_option))]
    pub partition: Option<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct SubmitArrayJobRequest {
    pub script_path: String,
    pub range: String,
    #[builder(default, setter(strip_option))]
    pub cores: Option<u32>,
    #[builder(default, setter(strip_option))]
    pub memory: Option<String>,
    #[builder(default, setter(strip_option))]
    pub time_limit: Option<String>,
    #[builder(default, setter(strip_option))]
    pub job_name: Option<String>,
    #[builder(default, setter(strip_option))]
    pub partition: Option<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct AllocateNodesRequest {
    #[builder(default = 1)]
    pub nodes: u32,
    #[builder(default = 1)]
    pub cores: u32,
    #[builder(default, setter(strip_option))]
    pub memory: Option<String>,
    #[builder(default, setter(strip_option))]
    pub time_limit: Option<String>,
    #[builder(default, setter(strip_option))]
    pub partition: Option<String>,
    #[builder(default, setter(strip_option))]
    pub job_name: Option<String>,
    #[builder(default)]
    pub immediate: bool,
}

/// Holds [`AdapterConfig`] plus the backend capability the adapter is
/// generic over. Mirrors the state/deps split the teacher's job scheduler
/// clients use: plain fields live directly on the adapter, an injected
/// capability is reached through a `Deps` type parameter so tests can swap
/// in whatever `SlurmBackend` they need.
pub struct SlurmAdapterState {
    pub config: AdapterConfig,
}

pub struct SlurmAdapter<Deps> {
    state: SlurmAdapterState,
    deps: Deps,
}

impl<Deps> SlurmAdapter<Deps> {
    pub fn new(state: SlurmAdapterState, deps: Deps) -> Self {
        Self { state, deps }
    }
}

impl<Deps> std::ops::Deref for SlurmAdapter<Deps> {
    type Target = SlurmAdapterState;
    fn deref(&self) -> &SlurmAdapterState {
        &self.state
    }
}

/// The concrete `Deps` the running gateway wires up: just the backend. A
/// bigger deployment could fold more shared capabilities into this struct
/// without touching any adapter method, since those are generic over `Deps`.
pub struct AdapterDeps {
    backend: Arc<dyn SlurmBackend>,
}

impl AdapterDeps {
    pub fn new(backend: Arc<dyn SlurmBackend>) -> Self {
        Self { backend }
    }
}

impl AsRef<Arc<dyn SlurmBackend>> for AdapterDeps {
    fn as_ref(&self) -> &Arc<dyn SlurmBackend> {
        &self.backend
    }
}

pub fn build_adapter(config: AdapterConfig, backend: Arc<dyn SlurmBackend>) -> SlurmAdapter<AdapterDeps> {
    SlurmAdapter::new(SlurmAdapterState { config }, AdapterDeps::new(backend))
}

impl<Deps> SlurmAdapter<Deps>
where
    Deps: AsRef<Arc<dyn SlurmBackend>> + Send + Sync,
{
    fn backend(&self) -> &Arc<dyn SlurmBackend> {
        self.deps.as_ref()
    }

    pub fn real_slurm(&self) -> bool {
        self.backend().is_real()
    }

    /// Runs a read-only query command (`squeue`, `sinfo`, `scontrol show`),
    /// retrying exactly once if the first attempt times out (spec §5).
    /// Mutating commands (`sbatch`, `scancel`, `salloc`) never go through
    /// this path — retrying those could double-submit or double-cancel.
    async fn run_readonly(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, GatewayError> {
        match self.backend().run(program, args, timeout, cancel).await {
            Err(GatewayError::Timeout(_)) => self.backend().run(program, args, timeout, cancel).await,
            other => other,
        }
    }

    pub async fn submit_job(&self, req: SubmitJobRequest, cancel: &CancellationToken) -> Result<Job, GatewayError> {
        if req.cores == 0 {
            return Err(GatewayError::InvalidParams("cores must be a positive integer".to_string()));
        }
        validate_script(&req.script_path).await?;
        let memory = req.memory.as_deref().map(MemorySpec::parse).transpose()?;
        let time_limit = req.time_limit.as_deref().map(TimeLimit::parse).transpose()?;
        ensure_output_dir(&self.config.output_dir).await?;

        let job_name = req.job_name.clone().unwrap_or_else(|| default_job_name(&req.script_path));
        let partition = req.partition.clone().unwrap_or_else(|| "debug".to_string());

        let mut args = vec![format!("--cpus-per-task={}", req.cores)];
        if let Some(m) = &memory {
            args.push(format!("--mem={}", m.as_str()));
        }
        if let Some(t) = &time_limit {
            args.push(format!("--time={}", t.as_str()));
        }
        args.push(format!("--job-name={job_name}"));
        args.push(format!("--partition={partition}"));
        args.push(format!("--output={}/slurm_%j.out", self.config.output_dir.display()));
        args.push(format!("--error={}/slurm_%j.err", self.config.output_dir.display()));
        args.push(req.script_path.clone());

        let output = self.backend().run("sbatch", &args, self.config.submit_timeout, cancel).await?;
        if !output.success {
            return Err(GatewayError::SubmissionRejected { stderr: output.stderr });
        }
        let id = parse_sbatch_job_id(&output.stdout)?;

        Ok(Job {
            id: Arc::from(id.as_str()),
            name: job_name,
            state: JobState::Pending,
            partition,
            user: String::new(),
            nodelist: String::new(),
            num_nodes: 1,
            num_cpus: req.cores,
            memory: memory.map(|m| m.as_str().to_string()).unwrap_or_default(),
            time_limit: time_limit.map(|t| t.as_str().to_string()).unwrap_or_default(),
            runtime_secs: 0,
            submit_time: chrono::Utc::now().timestamp(),
            start_time: 0,
            end_time: 0,
            exit_code: 0,
            script_path: req.script_path,
            stdout_path: paths::stdout_path(&self.config.output_dir, &id).display().to_string(),
            stderr_path: paths::stderr_path(&self.config.output_dir, &id).display().to_string(),
        })
    }

    pub async fn submit_array_job(
        &self,
        req: SubmitArrayJobRequest,
        cancel: &CancellationToken,
    ) -> Result<ArrayJob, GatewayError> {
        let cores = req.cores.unwrap_or(1);
        if cores == 0 {
            return Err(GatewayError::InvalidParams("cores must be a positive integer".to_string()));
        }
        validate_script(&req.script_path).await?;
        let range = ArrayRange::parse(&req.range)?;
        let memory = req.memory.as_deref().map(MemorySpec::parse).transpose()?;
        let time_limit = req.time_limit.as_deref().map(TimeLimit::parse).transpose()?;
        ensure_output_dir(&self.config.output_dir).await?;

        let job_name = req.job_name.clone().unwrap_or_else(|| default_job_name(&req.script_path));
        let partition = req.partition.clone().unwrap_or_else(|| "debug".to_string());

        let mut args = vec![format!("--cpus-per-task={cores}"), format!("--array={}", range.render())];
        if let Some(m) = &memory {
            args.push(format!("--mem={}", m.as_str()));
        }
        if let Some(t) = &time_limit {
            args.push(format!("--time={}", t.as_str()));
        }
        args.push(format!("--job-name={job_name}"));
        args.push(format!("--partition={partition}"));
        args.push(format!("--output={}/slurm_%A_%a.out", self.config.output_dir.display()));
        args.push(format!("--error={}/slurm_%A_%a.err", self.config.output_dir.display()));
        args.push(req.script_path.clone());

        let output = self.backend().run("sbatch", &args, self.config.submit_timeout, cancel).await?;
        if !output.success {
            return Err(GatewayError::SubmissionRejected { stderr: output.stderr });
        }
        let array_id = parse_sbatch_job_id(&output.stdout)?;

        let mut tasks = BTreeMap::new();
        for &task in range.tasks() {
            let child_id = paths::array_task_id(&array_id, task);
            tasks.insert(
                task,
                Job {
                    id: Arc::from(child_id.as_str()),
                    name: job_name.clone(),
                    state: JobState::Pending,
                    partition: partition.clone(),
                    user: String::new(),
                    nodelist: String::new(),
                    num_nodes: 1,
                    num_cpus: cores,
                    memory: memory.as_ref().map(|m| m.as_str().to_string()).unwrap_or_default(),
                    time_limit: time_limit.as_ref().map(|t| t.as_str().to_string()).unwrap_or_default(),
                    runtime_secs: 0,
                    submit_time: chrono::Utc::now().timestamp(),
                    start_time: 0,
                    end_time: 0,
                    exit_code: 0,
                    script_path: req.script_path.clone(),
                    stdout_path: paths::stdout_path(&self.config.output_dir, &child_id).display().to_string(),
                    stderr_path: paths::stderr_path(&self.config.output_dir, &child_id).display().to_string(),
                },
            );
        }

        Ok(ArrayJob {
            array_id: Arc::from(array_id.as_str()),
            range,
            tasks,
            stdout_path_pattern: format!("{}/slurm_<array_id>_<task_id>.out", self.config.output_dir.display()),
            stderr_path_pattern: format!("{}/slurm_<array_id>_<task_id>.err", self.config.output_dir.display()),
        })
    }

    /// `squeue` → `sacct` → `scontrol show job`, in that order: a job drops
    /// out of `squeue` once it leaves the live queue (spec §4.4).
    pub async fn check_job_status(&self, job_id: &str, cancel: &CancellationToken) -> Result<JobState, GatewayError> {
        let squeue_out = self
            .run_readonly(
                "squeue",
                &["-h".into(), "-j".into(), job_id.to_string(), "-o".into(), SQUEUE_FORMAT.into()],
                self.config.query_timeout,
                cancel,
            )
            .await?;
        if squeue_out.success {
            if let Some(row) = parse_squeue(&squeue_out.stdout).into_iter().find(|r| r.job_id == job_id) {
                return Ok(row.state());
            }
        }

        let sacct_out = self
            .run_readonly(
                "sacct",
                &["-j".into(), job_id.to_string(), "-o".into(), "State".into(), "-P".into(), "-n".into()],
                self.config.query_timeout,
                cancel,
            )
            .await?;
        if sacct_out.success {
            if let Some(state) = parse_sacct_state(&sacct_out.stdout) {
                return Ok(state);
            }
        }

        let scontrol_out = self
            .run_readonly("scontrol", &["show".into(), "job".into(), job_id.to_string()], self.config.query_timeout, cancel)
            .await?;
        if !scontrol_out.success {
            return Err(GatewayError::JobNotFound(job_id.to_string()));
        }
        let kv = parse_kv_block(&scontrol_out.stdout);
        Ok(kv.get("JobState").map(|s| JobState::from_slurm_code(s)).unwrap_or_default())
    }

    pub async fn get_job_details(&self, job_id: &str, cancel: &CancellationToken) -> Result<Job, GatewayError> {
        let out = self
            .run_readonly("scontrol", &["show".into(), "job".into(), job_id.to_string()], self.config.query_timeout, cancel)
            .await?;
        if !out.success {
            return Err(GatewayError::JobNotFound(job_id.to_string()));
        }
        Ok(job_from_kv(job_id, &parse_kv_block(&out.stdout)))
    }

    pub async fn list_jobs(
        &self,
        user: Option<&str>,
        state: Option<JobState>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Job>, GatewayError> {
        let effective_user = match (user, state) {
            (Some(u), _) => Some(u.to_string()),
            (None, None) => current_user(),
            (None, Some(_)) => None,
        };

        let mut args = vec!["-h".to_string(), "-o".to_string(), SQUEUE_FORMAT.to_string()];
        if let Some(u) = &effective_user {
            args.push("-u".to_string());
            args.push(u.clone());
        }

        let out = self.run_readonly("squeue", &args, self.config.query_timeout, cancel).await?;
        Ok(parse_squeue(&out.stdout)
            .into_iter()
            .filter(|row| state.map(|want| row.state() == want).unwrap_or(true))
            .map(|row| job_from_squeue_row(&row, &self.config.output_dir))
            .collect())
    }

    pub async fn get_job_output(
        &self,
        job_id: &str,
        stream: OutputStream,
        cancel: &CancellationToken,
    ) -> Result<JobOutput, GatewayError> {
        let path = match stream {
            OutputStream::Stdout => paths::stdout_path(&self.config.output_dir, job_id),
            OutputStream::Stderr => paths::stderr_path(&self.config.output_dir, job_id),
        };
        // Touch the job first: the mock backend only writes output files
        // once a job has been queried past PENDING.
        let state = self.check_job_status(job_id, cancel).await?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let truncated = bytes.len() > self.config.max_output_bytes;
                let end = bytes.len().min(self.config.max_output_bytes);
                Ok(JobOutput { content: String::from_utf8_lossy(&bytes[..end]).into_owned(), truncated })
            }
            Err(_) if state.is_terminal() => Err(GatewayError::OutputLost(job_id.to_string())),
            Err(_) => Err(GatewayError::OutputNotReady(job_id.to_string())),
        }
    }

    /// Idempotent: cancelling an already-terminal job just reports its
    /// current state rather than erroring (spec §5).
    pub async fn cancel_job(&self, job_id: &str, cancel: &CancellationToken) -> Result<JobState, GatewayError> {
        let current = self.check_job_status(job_id, cancel).await?;
        if current.is_terminal() {
            return Ok(current);
        }

        let out = self.backend().run("scancel", &[job_id.to_string()], self.config.query_timeout, cancel).await?;
        if !out.success {
            return Err(GatewayError::JobNotFound(job_id.to_string()));
        }

        let outcome = poll_until(CANCEL_POLL_INTERVAL, CANCEL_POLL_BUDGET, cancel, || async {
            match self.check_job_status(job_id, cancel).await {
                Ok(s) if s.is_terminal() => ControlFlow::Break(s),
                _ => ControlFlow::Continue(()),
            }
        })
        .await;

        Ok(match outcome {
            PollOutcome::Done(s) => s,
            _ => JobState::Cancelled,
        })
    }

    pub async fn get_cluster_info(&self, cancel: &CancellationToken) -> Result<ClusterInfo, GatewayError> {
        let out = self
            .run_readonly("sinfo", &["-h".into(), "-o".into(), SINFO_FORMAT.into()], self.config.query_timeout, cancel)
            .await?;
        let partitions = parse_sinfo(&out.stdout).iter().map(partition_from_row).collect();

        let version_out = self.run_readonly("sinfo", &["--version".into()], self.config.query_timeout, cancel).await.ok();
        let slurm_version = version_out
            .map(|o| o.stdout.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClusterInfo {
            cluster_name: std::env::var("SLURM_CLUSTER_NAME").unwrap_or_else(|_| "slurm".to_string()),
            slurm_version,
            partitions,
            real_slurm: self.real_slurm(),
        })
    }

    pub async fn get_queue_info(
        &self,
        partition: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Partition>, GatewayError> {
        let out = self
            .run_readonly("sinfo", &["-h".into(), "-o".into(), SINFO_FORMAT.into()], self.config.query_timeout, cancel)
            .await?;
        Ok(parse_sinfo(&out.stdout)
            .iter()
            .filter(|row| partition.map(|want| row.clean_name() == want).unwrap_or(true))
            .map(partition_from_row)
            .collect())
    }

    pub async fn get_node_info(&self, node: Option<&str>, cancel: &CancellationToken) -> Result<Vec<Node>, GatewayError> {
        let mut args = vec!["show".to_string(), "node".to_string()];
        if let Some(name) = node {
            args.push(name.to_string());
        }
        let out = self.run_readonly("scontrol", &args, self.config.query_timeout, cancel).await?;
        if !out.success {
            return Err(GatewayError::InvalidParams(format!(
                "unknown node `{}`",
                node.unwrap_or("<none>")
            )));
        }
        Ok(vec![node_from_kv(&parse_kv_block(&out.stdout))])
    }

    pub async fn allocate_nodes(
        &self,
        req: AllocateNodesRequest,
        cancel: &CancellationToken,
    ) -> Result<Allocation, GatewayError> {
        if req.cores == 0 || req.nodes == 0 {
            return Err(GatewayError::InvalidParams("nodes and cores must be positive integers".to_string()));
        }
        let memory = req.memory.as_deref().map(MemorySpec::parse).transpose()?;
        let time_limit = req.time_limit.as_deref().map(TimeLimit::parse).transpose()?;
        let partition = req.partition.clone().unwrap_or_else(|| "debug".to_string());
        let job_name = req.job_name.clone().unwrap_or_else(|| "allocation".to_string());

        let mut args = vec![
            "--no-shell".to_string(),
            format!("--nodes={}", req.nodes),
            format!("--ntasks={}", req.cores),
        ];
        if let Some(m) = &memory {
            args.push(format!("--mem={}", m.as_str()));
        }
        if let Some(t) = &time_limit {
            args.push(format!("--time={}", t.as_str()));
        }
        args.push(format!("--partition={partition}"));
        args.push(format!("--job-name={job_name}"));
        if req.immediate {
            args.push("--immediate".to_string());
        }

        let timeout = if req.immediate { self.config.immediate_timeout } else { self.config.max_alloc_wait };
        let base = Allocation {
            allocation_id: String::new(),
            nodes_requested: req.nodes,
            cores_per_node: req.cores,
            memory_per_node: memory.as_ref().map(|m| m.as_str().to_string()).unwrap_or_default(),
            time_limit: time_limit.as_ref().map(|t| t.as_str().to_string()).unwrap_or_default(),
            partition,
            job_name,
            nodes_allocated: Vec::new(),
            state: AllocationState::Requested,
            immediate: req.immediate,
        };

        // A real `salloc` blocked past its budget gets killed by the
        // executor's own timeout just like any other command — both the
        // immediate and non-immediate cases fall out of this one path.
        let output = match self.backend().run("salloc", &args, timeout, cancel).await {
            Ok(o) => o,
            Err(GatewayError::Timeout(_)) => return Ok(Allocation { state: AllocationState::Timeout, ..base }),
            Err(e) => return Err(e),
        };

        if !output.success {
            return Ok(match parse_salloc_stderr(&output.stderr) {
                SallocOutcome::ImmediateRejected => Allocation { state: AllocationState::Timeout, ..base },
                _ => Allocation { state: AllocationState::Failed, ..base },
            });
        }

        Ok(match parse_salloc_stderr(&output.stderr) {
            SallocOutcome::Granted { job_id } => {
                let nodes_allocated = self.resolve_nodelist(&job_id, cancel).await;
                Allocation { allocation_id: job_id, nodes_allocated, state: AllocationState::Allocated, ..base }
            }
            SallocOutcome::Pending { job_id } => Allocation { allocation_id: job_id, ..base },
            SallocOutcome::ImmediateRejected => Allocation { state: AllocationState::Timeout, ..base },
            SallocOutcome::Failed { .. } | SallocOutcome::Unrecognized => {
                Allocation { state: AllocationState::Failed, ..base }
            }
        })
    }

    async fn resolve_nodelist(&self, job_id: &str, cancel: &CancellationToken) -> Vec<String> {
        let out = self
            .run_readonly("scontrol", &["show".into(), "job".into(), job_id.to_string()], self.config.query_timeout, cancel)
            .await;
        match out {
            Ok(o) if o.success => parse_kv_block(&o.stdout)
                .get("NodeList")
                .filter(|s| !s.is_empty())
                .map(|s| vec![s.clone()])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub async fn get_allocation_status(
        &self,
        allocation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Allocation, GatewayError> {
        let state = self.check_job_status(allocation_id, cancel).await?;
        let out = self
            .run_readonly("scontrol", &["show".into(), "job".into(), allocation_id.to_string()], self.config.query_timeout, cancel)
            .await?;
        let kv = if out.success { parse_kv_block(&out.stdout) } else { BTreeMap::new() };

        Ok(Allocation {
            allocation_id: allocation_id.to_string(),
            nodes_requested: kv.get("NumNodes").and_then(|s| s.parse().ok()).unwrap_or(0),
            cores_per_node: kv.get("NumCPUs").and_then(|s| s.parse().ok()).unwrap_or(0),
            memory_per_node: String::new(),
            time_limit: kv.get("TimeLimit").cloned().unwrap_or_default(),
            partition: kv.get("Partition").cloned().unwrap_or_default(),
            job_name: kv.get("JobName").cloned().unwrap_or_default(),
            nodes_allocated: kv
                .get("NodeList")
                .filter(|s| !s.is_empty())
                .map(|s| vec![s.clone()])
                .unwrap_or_default(),
            state: allocation_state_from_job_state(state),
            immediate: false,
        })
    }

    pub async fn deallocate_nodes(
        &self,
        allocation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AllocationState, GatewayError> {
        let current = self.check_job_status(allocation_id, cancel).await?;
        if allocation_state_from_job_state(current) == AllocationState::Deallocated {
            return Ok(AllocationState::Deallocated);
        }

        let out = self.backend().run("scancel", &[allocation_id.to_string()], self.config.query_timeout, cancel).await?;
        if !out.success {
            return Err(GatewayError::JobNotFound(allocation_id.to_string()));
        }

        let _ = poll_until(CANCEL_POLL_INTERVAL, CANCEL_POLL_BUDGET, cancel, || async {
            match self.check_job_status(allocation_id, cancel).await {
                Ok(s) if allocation_state_from_job_state(s) == AllocationState::Deallocated => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        })
        .await;

        Ok(AllocationState::Deallocated)
    }
}

async fn validate_script(path: &str) -> Result<(), GatewayError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GatewayError::ScriptNotFound(format!("{path}: {e}")))?;
    match content.lines().next() {
        Some(first) if first.starts_with("#!") => Ok(()),
        _ => Err(GatewayError::ScriptNotFound(format!("{path} has no shebang line"))),
    }
}

async fn ensure_output_dir(dir: &PathBuf) -> Result<(), GatewayError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| GatewayError::Internal(format!("failed to create output directory {}: {e}", dir.display())))
}

fn default_job_name(script_path: &str) -> String {
    std::path::Path::new(script_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string())
}

fn current_user() -> Option<String> {
    std::env::var("USER").ok().or_else(|| std::env::var("LOGNAME").ok())
}

/// Parses Slurm's `[[D-]HH:]MM:SS` elapsed-time format into seconds. Unknown
/// tokens (`"INVALID"`, `"N/A"`) become zero rather than failing the call.
fn parse_slurm_duration(raw: &str) -> u64 {
    let (days, rest) = match raw.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().unwrap_or(0), rest),
        None => (0, raw),
    };
    let parts: Vec<u64> = rest.split(':').filter_map(|p| p.parse().ok()).collect();
    let (h, m, s) = match parts.len() {
        3 => (parts[0], parts[1], parts[2]),
        2 => (0, parts[0], parts[1]),
        1 => (0, 0, parts[0]),
        _ => (0, 0, 0),
    };
    days * 86_400 + h * 3_600 + m * 60 + s
}

fn parse_epoch(raw: &str) -> i64 {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn job_from_squeue_row(row: &SqueueRow, output_dir: &std::path::Path) -> Job {
    Job {
        id: Arc::from(row.job_id.as_str()),
        name: row.name.clone(),
        state: row.state(),
        partition: row.partition.clone(),
        user: row.user.clone(),
        nodelist: row.nodelist.clone(),
        num_nodes: row.num_nodes,
        num_cpus: row.num_cpus,
        memory: String::new(),
        time_limit: row.time_limit.clone(),
        runtime_secs: parse_slurm_duration(&row.time_used),
        submit_time: 0,
        start_time: 0,
        end_time: 0,
        exit_code: 0,
        script_path: String::new(),
        stdout_path: paths::stdout_path(output_dir, &row.job_id).display().to_string(),
        stderr_path: paths::stderr_path(output_dir, &row.job_id).display().to_string(),
    }
}

fn job_from_kv(job_id: &str, kv: &BTreeMap<String, String>) -> Job {
    let exit_code = kv
        .get("ExitCode")
        .and_then(|s| s.split_once(':').map(|(code, _)| code))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Job {
        id: Arc::from(job_id),
        name: kv.get("JobName").cloned().unwrap_or_default(),
        state: kv.get("JobState").map(|s| JobState::from_slurm_code(s)).unwrap_or_default(),
        partition: kv.get("Partition").cloned().unwrap_or_default(),
        user: kv
            .get("UserId")
            .map(|s| s.split('(').next().unwrap_or(s).to_string())
            .unwrap_or_default(),
        nodelist: kv.get("NodeList").cloned().unwrap_or_default(),
        num_nodes: kv.get("NumNodes").and_then(|s| s.parse().ok()).unwrap_or(0),
        num_cpus: kv.get("NumCPUs").and_then(|s| s.parse().ok()).unwrap_or(0),
        memory: String::new(),
        time_limit: kv.get("TimeLimit").cloned().unwrap_or_default(),
        runtime_secs: kv.get("RunTime").map(|s| parse_slurm_duration(s)).unwrap_or(0),
        submit_time: kv.get("SubmitTime").map(|s| parse_epoch(s)).unwrap_or(0),
        start_time: kv.get("StartTime").map(|s| parse_epoch(s)).unwrap_or(0),
        end_time: kv.get("EndTime").map(|s| parse_epoch(s)).unwrap_or(0),
        exit_code,
        script_path: kv.get("Command").cloned().unwrap_or_default(),
        stdout_path: kv.get("StdOut").cloned().unwrap_or_default(),
        stderr_path: kv.get("StdErr").cloned().unwrap_or_default(),
    }
}

fn node_from_kv(kv: &BTreeMap<String, String>) -> Node {
    Node {
        name: kv.get("NodeName").cloned().unwrap_or_default(),
        state: kv.get("State").map(|s| domain::model::NodeState::from_slurm_code(s)).unwrap_or_default(),
        cpus_total: kv.get("CPUTot").and_then(|s| s.parse().ok()).unwrap_or(0),
        cpus_used: kv.get("CPUAlloc").and_then(|s| s.parse().ok()).unwrap_or(0),
        memory_total: kv.get("RealMemory").and_then(|s| s.parse().ok()).unwrap_or(0),
        features: kv
            .get("Features")
            .map(|s| s.split(',').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()).collect())
            .unwrap_or_default(),
    }
}

fn partition_from_row(row: &PartitionRow) -> Partition {
    Partition {
        name: row.clean_name(),
        state: row.state(),
        nodes_total: row.nodes,
        nodes_idle: if matches!(row.state(), domain::model::PartitionState::Up) { row.nodes } else { 0 },
        time_limit: row.time_limit.clone(),
        default: row.is_default(),
    }
}

fn allocation_state_from_job_state(state: JobState) -> AllocationState {
    match state {
        JobState::Pending => AllocationState::Requested,
        JobState::Running | JobState::Completing => AllocationState::Allocated,
        JobState::Cancelled | JobState::Completed => AllocationState::Deallocated,
        JobState::Failed | JobState::NodeFail => AllocationState::Failed,
        JobState::Timeout => AllocationState::Timeout,
        JobState::Unknown => AllocationState::Requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn adapter(output_dir: PathBuf) -> SlurmAdapter<AdapterDeps> {
        let backend: Arc<dyn SlurmBackend> = Arc::new(MockBackend::new(output_dir.clone()));
        build_adapter(AdapterConfig { output_dir, ..Default::default() }, backend)
    }

    async fn write_script(dir: &std::path::Path, name: &str, body: &str) -> String {
        tokio::fs::create_dir_all(dir).await.unwrap();
        let path = dir.join(name);
        tokio::fs::write(&path, body).await.unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn submit_rejects_zero_cores() {
        let dir = std::env::temp_dir().join(format!("adapter-test-{}", std::process::id()));
        let a = adapter(dir.clone());
        let cancel = CancellationToken::new();
        let script = write_script(&dir, "ok.sh", "#!/bin/sh\necho hi\n").await;
        let req = SubmitJobRequest::builder().script_path(script).cores(0).build();
        let err = a.submit_job(req, &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn submit_rejects_missing_shebang() {
        let dir = std::env::temp_dir().join(format!("adapter-test-{}", std::process::id() + 1));
        let a = adapter(dir.clone());
        let cancel = CancellationToken::new();
        let script = write_script(&dir, "noshebang.sh", "echo hi\n").await;
        let req = SubmitJobRequest::builder().script_path(script).cores(1).build();
        let err = a.submit_job(req, &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::ScriptNotFound(_)));
    }

    #[tokio::test]
    async fn submit_then_check_status_then_cancel() {
        let dir = std::env::temp_dir().join(format!("adapter-test-{}", std::process::id() + 2));
        let a = adapter(dir.clone());
        let cancel = CancellationToken::new();
        let script = write_script(&dir, "ok.sh", "#!/bin/sh\necho hi\n").await;

        let req = SubmitJobRequest::builder().script_path(script).cores(1).build();
        let job = a.submit_job(req, &cancel).await.unwrap();
        assert_eq!(job.state, JobState::Pending);

        let state = a.check_job_status(&job.id, &cancel).await.unwrap();
        assert!(matches!(state, JobState::Pending | JobState::Running));

        let cancelled = a.cancel_job(&job.id, &cancel).await.unwrap();
        assert!(cancelled.is_terminal());

        // idempotent: cancelling again just reports the terminal state
        let again = a.cancel_job(&job.id, &cancel).await.unwrap();
        assert_eq!(again, cancelled);
    }

    #[tokio::test]
    async fn submit_array_job_expands_tasks() {
        let dir = std::env::temp_dir().join(format!("adapter-test-{}", std::process::id() + 3));
        let a = adapter(dir.clone());
        let cancel = CancellationToken::new();
        let script = write_script(&dir, "ok.sh", "#!/bin/sh\necho hi\n").await;

        let req = SubmitArrayJobRequest::builder().script_path(script).range("1-3".to_string()).build();
        let array = a.submit_array_job(req, &cancel).await.unwrap();
        assert_eq!(array.tasks.len(), 3);
        assert!(array.tasks.contains_key(&1) && array.tasks.contains_key(&3));
    }

    #[tokio::test]
    async fn allocate_nodes_immediate_timeout_surfaces_as_timeout_state() {
        let dir = std::env::temp_dir().join(format!("adapter-test-{}", std::process::id() + 4));
        let mut config = AdapterConfig { output_dir: dir.clone(), ..Default::default() };
        config.immediate_timeout = Duration::from_millis(300);
        let backend: Arc<dyn SlurmBackend> = Arc::new(MockBackend::new(dir));
        let a = build_adapter(config, backend);
        let cancel = CancellationToken::new();

        let saturate = AllocateNodesRequest::builder().nodes(1).cores(4).build();
        a.allocate_nodes(saturate, &cancel).await.unwrap();

        let req = AllocateNodesRequest::builder().nodes(1).cores(1).immediate(true).build();
        let alloc = a.allocate_nodes(req, &cancel).await.unwrap();
        assert_eq!(alloc.state, AllocationState::Timeout);
    }

    #[tokio::test]
    async fn unknown_job_status_falls_through_to_not_found() {
        let dir = std::env::temp_dir().join(format!("adapter-test-{}", std::process::id() + 5));
        let a = adapter(dir);
        let cancel = CancellationToken::new();
        let err = a.check_job_status("99999", &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::JobNotFound(_)));
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use domain::model::job::JobState;
use domain::GatewayError;
use runtime::{ArgSpec, ArgType, Tool, ToolRegistry, ToolSchema};
use serde_json::{json, Value};
use service::{AdapterDeps, OutputStream, SlurmAdapter, SubmitArrayJobRequest, SubmitJobRequest};
use tokio_util::sync::CancellationToken;

fn opt_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn opt_u32(v: &Value, key: &str) -> Option<u32> {
    v.get(key).and_then(Value::as_u64).map(|n| n as u32)
}

fn req_str(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
}

fn job_state_from_arg(raw: &str) -> JobState {
    JobState::from_slurm_code(raw)
}

pub struct SubmitSlurmJob(Arc<SlurmAdapter<AdapterDeps>>);
pub struct SubmitArrayJob(Arc<SlurmAdapter<AdapterDeps>>);
pub struct CheckJobStatus(Arc<SlurmAdapter<AdapterDeps>>);
pub struct GetJobDetails(Arc<SlurmAdapter<AdapterDeps>>);
pub struct GetJobOutput(Arc<SlurmAdapter<AdapterDeps>>);
pub struct CancelSlurmJob(Arc<SlurmAdapter<AdapterDeps>>);
pub struct ListSlurmJobs(Arc<SlurmAdapter<AdapterDeps>>);

#[async_trait]
impl Tool for SubmitSlurmJob {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "submit_slurm_job",
            description: "Submits a batch job via sbatch and returns its initial state.",
            args: vec![
                ArgSpec::required("script_path", ArgType::String),
                ArgSpec::required("cores", ArgType::Integer),
                ArgSpec::optional("memory", ArgType::String, Value::Null),
                ArgSpec::optional("time_limit", ArgType::String, Value::Null),
                ArgSpec::optional("job_name", ArgType::String, Value::Null),
                ArgSpec::optional("partition", ArgType::String, Value::Null),
            ],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let req = SubmitJobRequest {
            script_path: req_str(&arguments, "script_path"),
            cores: opt_u32(&arguments, "cores").unwrap_or(0),
            memory: opt_str(&arguments, "memory"),
            time_limit: opt_str(&arguments, "time_limit"),
            job_name: opt_str(&arguments, "job_name"),
            partition: opt_str(&arguments, "partition"),
        };
        let job = self.0.submit_job(req, cancel).await?;
        Ok(serde_json::to_value(job).expect("Job always serializes"))
    }
}

#[async_trait]
impl Tool for SubmitArrayJob {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "submit_array_job",
            description: "Submits a Slurm job array and returns every expanded task.",
            args: vec![
                ArgSpec::required("script_path", ArgType::String),
                ArgSpec::required("range", ArgType::String),
                ArgSpec::optional("cores", ArgType::Integer, json!(1)),
                ArgSpec::optional("memory", ArgType::String, Value::Null),
                ArgSpec::optional("time_limit", ArgType::String, Value::Null),
                ArgSpec::optional("job_name", ArgType::String, Value::Null),
                ArgSpec::optional("partition", ArgType::String, Value::Null),
            ],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let req = SubmitArrayJobRequest {
            script_path: req_str(&arguments, "script_path"),
            range: req_str(&arguments, "range"),
            cores: opt_u32(&arguments, "cores"),
            memory: opt_str(&arguments, "memory"),
            time_limit: opt_str(&arguments, "time_limit"),
            job_name: opt_str(&arguments, "job_name"),
            partition: opt_str(&arguments, "partition"),
        };
        let array = self.0.submit_array_job(req, cancel).await?;
        Ok(json!({
            "arrayId": array.array_id,
            "tasks": serde_json::to_value(&array.tasks).expect("tasks always serialize"),
            "stdoutPathPattern": array.stdout_path_pattern,
            "stderrPathPattern": array.stderr_path_pattern,
        }))
    }
}

#[async_trait]
impl Tool for CheckJobStatus {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "check_job_status",
            description: "Returns a job's current state via squeue/sacct/scontrol fallback.",
            args: vec![ArgSpec::required("job_id", ArgType::String)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let job_id = req_str(&arguments, "job_id");
        let state = self.0.check_job_status(&job_id, cancel).await?;
        Ok(json!({ "job_id": job_id, "state": state }))
    }
}

#[async_trait]
impl Tool for GetJobDetails {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "get_job_details",
            description: "Returns the full scontrol record for a job.",
            args: vec![ArgSpec::required("job_id", ArgType::String)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let job_id = req_str(&arguments, "job_id");
        let job = self.0.get_job_details(&job_id, cancel).await?;
        Ok(serde_json::to_value(job).expect("Job always serializes"))
    }
}

#[async_trait]
impl Tool for GetJobOutput {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "get_job_output",
            description: "Reads a job's stdout or stderr file, truncated to the configured byte budget.",
            args: vec![
                ArgSpec::required("job_id", ArgType::String),
                ArgSpec::optional("stream", ArgType::String, json!("stdout")).with_enum(vec!["stdout", "stderr"]),
            ],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let job_id = req_str(&arguments, "job_id");
        let stream = match arguments.get("stream").and_then(Value::as_str) {
            Some("stderr") => OutputStream::Stderr,
            _ => OutputStream::Stdout,
        };
        let output = self.0.get_job_output(&job_id, stream, cancel).await?;
        Ok(json!({ "content": output.content, "truncated": output.truncated }))
    }
}

#[async_trait]
impl Tool for CancelSlurmJob {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "cancel_slurm_job",
            description: "Cancels a job via scancel; idempotent on already-terminal jobs.",
            args: vec![ArgSpec::required("job_id", ArgType::String)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let job_id = req_str(&arguments, "job_id");
        let _ = self.0.cancel_job(&job_id, cancel).await?;
        Ok(json!({ "status": "cancelled" }))
    }
}

#[async_trait]
impl Tool for ListSlurmJobs {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "list_slurm_jobs",
            description: "Lists jobs, defaulting to the caller's own when neither filter is given.",
            args: vec![
                ArgSpec::optional("user", ArgType::String, Value::Null),
                ArgSpec::optional("state", ArgType::String, Value::Null).with_enum(vec![
                    "PENDING",
                    "RUNNING",
                    "COMPLETING",
                    "COMPLETED",
                    "FAILED",
                    "CANCELLED",
                    "TIMEOUT",
                    "NODE_FAIL",
                    "UNKNOWN",
                ]),
            ],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let user = opt_str(&arguments, "user");
        let state = opt_str(&arguments, "state").as_deref().map(job_state_from_arg);
        let jobs = self.0.list_jobs(user.as_deref(), state, cancel).await?;
        Ok(serde_json::to_value(jobs).expect("jobs always serialize"))
    }
}

pub fn register(registry: &mut ToolRegistry, adapter: Arc<SlurmAdapter<AdapterDeps>>) {
    registry.register(Arc::new(SubmitSlurmJob(adapter.clone())));
    registry.register(Arc::new(SubmitArrayJob(adapter.clone())));
    registry.register(Arc::new(CheckJobStatus(adapter.clone())));
    registry.register(Arc::new(GetJobDetails(adapter.clone())));
    registry.register(Arc::new(GetJobOutput(adapter.clone())));
    registry.register(Arc::new(CancelSlurmJob(adapter.clone())));
    registry.register(Arc::new(ListSlurmJobs(adapter)));
}

use std::sync::Arc;

use async_trait::async_trait;
use domain::GatewayError;
use runtime::{ArgSpec, ArgType, Tool, ToolRegistry, ToolSchema};
use serde_json::{json, Value};
use service::{AdapterDeps, AllocateNodesRequest, SlurmAdapter};
use tokio_util::sync::CancellationToken;

fn opt_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn opt_u32(v: &Value, key: &str, default: u32) -> u32 {
    v.get(key).and_then(Value::as_u64).map(|n| n as u32).unwrap_or(default)
}

fn req_str(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
}

pub struct AllocateNodes(Arc<SlurmAdapter<AdapterDeps>>);
pub struct DeallocateNodes(Arc<SlurmAdapter<AdapterDeps>>);
pub struct GetAllocationStatus(Arc<SlurmAdapter<AdapterDeps>>);

#[async_trait]
impl Tool for AllocateNodes {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "allocate_nodes",
            description: "Requests an interactive node allocation via salloc --no-shell.",
            args: vec![
                ArgSpec::optional("nodes", ArgType::Integer, json!(1)),
                ArgSpec::optional("cores", ArgType::Integer, json!(1)),
                ArgSpec::optional("memory", ArgType::String, Value::Null),
                ArgSpec::optional("time_limit", ArgType::String, Value::Null),
                ArgSpec::optional("partition", ArgType::String, Value::Null),
                ArgSpec::optional("job_name", ArgType::String, Value::Null),
                ArgSpec::optional("immediate", ArgType::Boolean, json!(false)),
            ],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let req = AllocateNodesRequest {
            nodes: opt_u32(&arguments, "nodes", 1),
            cores: opt_u32(&arguments, "cores", 1),
            memory: opt_str(&arguments, "memory"),
            time_limit: opt_str(&arguments, "time_limit"),
            partition: opt_str(&arguments, "partition"),
            job_name: opt_str(&arguments, "job_name"),
            immediate: arguments.get("immediate").and_then(Value::as_bool).unwrap_or(false),
        };
        let allocation = self.0.allocate_nodes(req, cancel).await?;
        Ok(serde_json::to_value(allocation).expect("Allocation always serializes"))
    }
}

#[async_trait]
impl Tool for DeallocateNodes {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "deallocate_nodes",
            description: "Releases an allocation via scancel; idempotent once already deallocated.",
            args: vec![ArgSpec::required("allocation_id", ArgType::String)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let allocation_id = req_str(&arguments, "allocation_id");
        let state = self.0.deallocate_nodes(&allocation_id, cancel).await?;
        Ok(json!({ "allocationId": allocation_id, "state": state }))
    }
}

#[async_trait]
impl Tool for GetAllocationStatus {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "get_allocation_status",
            description: "Reconstructs an allocation's current state from scontrol.",
            args: vec![ArgSpec::required("allocation_id", ArgType::String)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let allocation_id = req_str(&arguments, "allocation_id");
        let allocation = self.0.get_allocation_status(&allocation_id, cancel).await?;
        Ok(serde_json::to_value(allocation).expect("Allocation always serializes"))
    }
}

pub fn register(registry: &mut ToolRegistry, adapter: Arc<SlurmAdapter<AdapterDeps>>) {
    registry.register(Arc::new(AllocateNodes(adapter.clone())));
    registry.register(Arc::new(DeallocateNodes(adapter.clone())));
    registry.register(Arc::new(GetAllocationStatus(adapter)));
}

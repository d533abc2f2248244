use std::sync::Arc;

use async_trait::async_trait;
use domain::GatewayError;
use runtime::{ArgSpec, ArgType, Tool, ToolRegistry, ToolSchema};
use serde_json::Value;
use service::{AdapterDeps, SlurmAdapter};
use tokio_util::sync::CancellationToken;

pub struct GetSlurmInfo(Arc<SlurmAdapter<AdapterDeps>>);
pub struct GetQueueInfo(Arc<SlurmAdapter<AdapterDeps>>);
pub struct GetNodeInfo(Arc<SlurmAdapter<AdapterDeps>>);

#[async_trait]
impl Tool for GetSlurmInfo {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "get_slurm_info",
            description: "Returns cluster name, Slurm version, and every partition.",
            args: vec![],
        })
    }

    async fn call(&self, _arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let info = self.0.get_cluster_info(cancel).await?;
        Ok(serde_json::to_value(info).expect("ClusterInfo always serializes"))
    }
}

#[async_trait]
impl Tool for GetQueueInfo {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "get_queue_info",
            description: "Returns partition queue state, optionally filtered to one partition.",
            args: vec![ArgSpec::optional("partition", ArgType::String, Value::Null)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let partition = arguments.get("partition").and_then(Value::as_str);
        let partitions = self.0.get_queue_info(partition, cancel).await?;
        Ok(serde_json::to_value(partitions).expect("partitions always serialize"))
    }
}

#[async_trait]
impl Tool for GetNodeInfo {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| ToolSchema {
            name: "get_node_info",
            description: "Returns node state, optionally filtered to one node name.",
            args: vec![ArgSpec::optional("node", ArgType::String, Value::Null)],
        })
    }

    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError> {
        let node = arguments.get("node").and_then(Value::as_str);
        let nodes = self.0.get_node_info(node, cancel).await?;
        Ok(serde_json::to_value(nodes).expect("nodes always serialize"))
    }
}

pub fn register(registry: &mut ToolRegistry, adapter: Arc<SlurmAdapter<AdapterDeps>>) {
    registry.register(Arc::new(GetSlurmInfo(adapter.clone())));
    registry.register(Arc::new(GetQueueInfo(adapter.clone())));
    registry.register(Arc::new(GetNodeInfo(adapter)));
}

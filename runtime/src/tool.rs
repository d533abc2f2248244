//! Tool declaration (spec §4.5 / C5). A `Tool` pairs a schema the
//! dispatcher validates arguments against with the async capability
//! function it invokes once validation passes.

use async_trait::async_trait;
use domain::error::GatewayError;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Integer,
    Boolean,
    Number,
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub key: &'static str,
    pub ty: ArgType,
    pub required: bool,
    pub allowed_values: Option<Vec<&'static str>>,
    pub default: Option<Value>,
}

impl ArgSpec {
    pub fn required(key: &'static str, ty: ArgType) -> Self {
        Self {
            key,
            ty,
            required: true,
            allowed_values: None,
            default: None,
        }
    }

    pub fn optional(key: &'static str, ty: ArgType, default: Value) -> Self {
        Self {
            key,
            ty,
            required: false,
            allowed_values: None,
            default: Some(default),
        }
    }

    pub fn with_enum(mut self, values: Vec<&'static str>) -> Self {
        self.allowed_values = Some(values);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgSpec>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    /// Invoked with arguments that have already passed [`ToolSchema`]
    /// validation and had defaults applied. `cancel` is transport-owned:
    /// a disconnected SSE session or a drained-past-deadline stdio shutdown
    /// cancels it, and implementations must pass it down into whatever
    /// backend call they make so the in-flight Slurm CLI invocation is
    /// actually terminated rather than merely orphaned.
    async fn call(&self, arguments: Value, cancel: &CancellationToken) -> Result<Value, GatewayError>;
}

//! Resolves an incoming JSON-RPC method to a tool call, validates its
//! arguments, runs it, and wraps the result in the MCP envelope (spec
//! §4.5). One `Dispatcher` is shared by every in-flight request on both
//! transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::model::ResultEnvelope;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::jsonrpc::{ProtocolError, RawRequest, Response};
use crate::pool::WorkerPool;
use crate::registry::ToolRegistry;
use crate::validate::validate_and_apply_defaults;

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

pub struct Dispatcher {
    registry: ToolRegistry,
    pool: WorkerPool,
    real_slurm: bool,
    server_info: ServerInfo,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    shutdown: CancellationToken,
}

/// What a dispatched request becomes: a response frame, or nothing at all
/// for notifications (spec §6).
pub enum Dispatched {
    Response(Response),
    NoResponse,
    Shutdown(Response),
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, pool: WorkerPool, real_slurm: bool, server_info: ServerInfo) -> Self {
        Self {
            registry,
            pool,
            real_slurm,
            server_info,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// A token transports derive per-connection/per-call tokens from via
    /// [`CancellationToken::child_token`], so that a drain-past-deadline or
    /// an explicit `shutdown` call reaches every in-flight tool call.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn handle_raw(&self, raw: &str, cancel: &CancellationToken) -> Dispatched {
        let request: RawRequest = match serde_json::from_str(raw) {
            Ok(r) => r,
            Err(_) => return Dispatched::Response(Response::err(Value::Null, ProtocolError::ParseError)),
        };
        self.handle(request, cancel).await
    }

    pub async fn handle(&self, request: RawRequest, cancel: &CancellationToken) -> Dispatched {
        let id = request.id.clone();
        let is_notification = request.is_notification();

        let Some(method) = request.method.clone() else {
            return respond(id, is_notification, Err(ProtocolError::InvalidRequest("missing `method`".into())));
        };
        if request.jsonrpc.as_deref() != Some("2.0") {
            return respond(
                id,
                is_notification,
                Err(ProtocolError::InvalidRequest("`jsonrpc` must be \"2.0\"".into())),
            );
        }

        match method.as_str() {
            "initialize" => respond(id, is_notification, Ok(self.initialize_result())),
            "notifications/initialized" => Dispatched::NoResponse,
            "tools/list" => respond(id, is_notification, Ok(self.tools_list_result())),
            "tools/call" => {
                let result = self.call_tool(request.params.unwrap_or(Value::Null), cancel).await;
                respond(id, is_notification, result)
            }
            "shutdown" => {
                self.drain(Duration::from_secs(30)).await;
                match respond(id, is_notification, Ok(json!({"ok": true}))) {
                    Dispatched::Response(r) => Dispatched::Shutdown(r),
                    other => other,
                }
            }
            other => respond(
                id,
                is_notification,
                Err(ProtocolError::MethodNotFound(other.to_string())),
            ),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "serverInfo": { "name": self.server_info.name, "version": self.server_info.version },
            "capabilities": { "tools": {} },
            "tools": self.tool_schema_json(),
        })
    }

    fn tools_list_result(&self) -> Value {
        json!({ "tools": self.tool_schema_json() })
    }

    fn tool_schema_json(&self) -> Vec<Value> {
        self.registry
            .schemas()
            .into_iter()
            .map(|schema| {
                json!({
                    "name": schema.name,
                    "description": schema.description,
                    "arguments": schema.args.iter().map(|a| json!({
                        "key": a.key,
                        "type": format!("{:?}", a.ty).to_lowercase(),
                        "required": a.required,
                        "allowedValues": a.allowed_values,
                        "default": a.default,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect()
    }

    async fn call_tool(&self, params: Value, cancel: &CancellationToken) -> Result<Value, ProtocolError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidParams("`tools/call` requires a string `name`".into()))?
            .to_string();
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let Some(tool) = self.registry.get(&name) else {
            return Err(ProtocolError::MethodNotFound(name));
        };

        let validated = match validate_and_apply_defaults(tool.schema(), arguments) {
            Ok(v) => v,
            Err(message) => {
                return Ok(serde_json::to_value(ResultEnvelope::error(
                    &name,
                    self.real_slurm,
                    domain::error::ErrorKind::InvalidParams,
                    &message,
                    Value::Null,
                ))
                .expect("envelope always serializes"));
            }
        };

        let Some(_permit) = self.pool.acquire().await else {
            return Err(ProtocolError::ServerBusy);
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = tool.call(validated, cancel).await;
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }

        let envelope = match outcome {
            Ok(result) => ResultEnvelope::ok(&name, self.real_slurm, &result),
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "tool call failed");
                ResultEnvelope::error(&name, self.real_slurm, err.kind(), &err.to_string(), Value::Null)
            }
        };
        Ok(serde_json::to_value(envelope).expect("envelope always serializes"))
    }

    /// Waits for in-flight calls to finish, bounded by `timeout` (spec
    /// §4.5's 30-second shutdown drain). Calls still running when the
    /// deadline passes are cancelled via [`Self::shutdown_token`] rather
    /// than left to run past it.
    pub async fn drain(&self, timeout: Duration) {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            return;
        }
        let wait = self.idle.notified();
        if tokio::time::timeout(timeout, wait).await.is_err() {
            tracing::warn!("drain deadline elapsed with tool calls still in flight; cancelling them");
            self.shutdown.cancel();
        }
    }
}

fn respond(id: Option<Value>, is_notification: bool, result: Result<Value, ProtocolError>) -> Dispatched {
    if is_notification {
        return Dispatched::NoResponse;
    }
    let id = id.unwrap_or(Value::Null);
    match result {
        Ok(value) => Dispatched::Response(Response::ok(id, value)),
        Err(err) => Dispatched::Response(Response::err(id, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ArgSpec, ArgType, Tool, ToolSchema};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| ToolSchema {
                name: "echo",
                description: "echoes back",
                args: vec![ArgSpec::required("msg", ArgType::String)],
            })
        }

        async fn call(&self, arguments: Value, _cancel: &CancellationToken) -> Result<Value, domain::error::GatewayError> {
            Ok(arguments)
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        Dispatcher::new(
            registry,
            WorkerPool::new(4, 4),
            false,
            ServerInfo {
                name: "test",
                version: "0.0.0",
            },
        )
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let d = dispatcher();
        let req = RawRequest {
            jsonrpc: Some("2.0".into()),
            id: Some(json!(1)),
            method: Some("bogus".into()),
            params: None,
        };
        match d.handle(req, &CancellationToken::new()).await {
            Dispatched::Response(r) => {
                let s = serde_json::to_string(&r).unwrap();
                assert!(s.contains("-32601"));
            }
            _ => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn notification_produces_no_response() {
        let d = dispatcher();
        let req = RawRequest {
            jsonrpc: Some("2.0".into()),
            id: None,
            method: Some("notifications/initialized".into()),
            params: None,
        };
        assert!(matches!(d.handle(req, &CancellationToken::new()).await, Dispatched::NoResponse));
    }

    #[tokio::test]
    async fn successful_tool_call_wraps_envelope() {
        let d = dispatcher();
        let req = RawRequest {
            jsonrpc: Some("2.0".into()),
            id: Some(json!(1)),
            method: Some("tools/call".into()),
            params: Some(json!({"name": "echo", "arguments": {"msg": "hi"}})),
        };
        match d.handle(req, &CancellationToken::new()).await {
            Dispatched::Response(r) => {
                let v = serde_json::to_value(&r).unwrap();
                let content = &v["result"]["content"][0]["text"];
                assert!(content.as_str().unwrap().contains("hi"));
                assert_eq!(v["result"]["isError"], false);
            }
            _ => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn invalid_params_becomes_error_envelope_not_protocol_error() {
        let d = dispatcher();
        let req = RawRequest {
            jsonrpc: Some("2.0".into()),
            id: Some(json!(1)),
            method: Some("tools/call".into()),
            params: Some(json!({"name": "echo", "arguments": {}})),
        };
        match d.handle(req, &CancellationToken::new()).await {
            Dispatched::Response(r) => {
                let v = serde_json::to_value(&r).unwrap();
                assert_eq!(v["result"]["isError"], true);
                assert_eq!(v["result"]["_meta"]["error"], "InvalidParams");
            }
            _ => panic!("expected a response"),
        }
    }
}

//! JSON-RPC 2.0 framing (spec §6). Request/response shapes and the
//! protocol-level error codes, kept distinct from [`domain::GatewayError`]
//! (application-level errors never become JSON-RPC errors — spec §7).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: Option<String>,
    pub params: Option<Value>,
}

impl RawRequest {
    /// A request with no `id` is a notification; it produces no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Result { result: Value },
    Error { error: RpcErrorObject },
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            payload: Payload::Result { result },
        }
    }

    pub fn err(id: Value, error: ProtocolError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            payload: Payload::Error {
                error: error.into_object(),
            },
        }
    }
}

/// Protocol-level failures (spec §6's reserved code range plus the three
/// gateway-specific transport codes). Distinct from `domain::ErrorKind`,
/// which only ever appears inside a successful envelope's `_meta.error`.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    ParseError,
    InvalidRequest(String),
    MethodNotFound(String),
    InvalidParams(String),
    InternalError(String),
    ServerBusy,
}

impl ProtocolError {
    pub fn into_object(self) -> RpcErrorObject {
        let (code, message) = match &self {
            ProtocolError::ParseError => (-32700, "Parse error".to_string()),
            ProtocolError::InvalidRequest(m) => (-32600, format!("Invalid Request: {m}")),
            ProtocolError::MethodNotFound(m) => (-32601, format!("Method not found: {m}")),
            ProtocolError::InvalidParams(m) => (-32602, format!("Invalid params: {m}")),
            ProtocolError::InternalError(m) => (-32603, format!("Internal error: {m}")),
            ProtocolError::ServerBusy => (-32000, "Server busy".to_string()),
        };
        RpcErrorObject {
            code,
            message,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_has_no_id() {
        let raw: RawRequest = serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(raw.is_notification());
    }

    #[test]
    fn response_serializes_result_or_error_not_both() {
        let ok = Response::ok(Value::from(1), serde_json::json!({"a":1}));
        let s = serde_json::to_string(&ok).unwrap();
        assert!(s.contains("\"result\""));
        assert!(!s.contains("\"error\""));

        let err = Response::err(Value::from(1), ProtocolError::MethodNotFound("foo".into()));
        let s = serde_json::to_string(&err).unwrap();
        assert!(s.contains("\"error\""));
        assert!(s.contains("-32601"));
    }
}

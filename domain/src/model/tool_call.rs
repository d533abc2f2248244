use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorKind;

/// A single dispatched tool invocation (spec §3's `ToolCall`). The request
/// half mirrors what the transport decoded; the result half is what the
/// dispatcher hands back for framing.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    pub request_id: Value,
}

/// The MCP `content` + `_meta` envelope (spec §4.5). Preserved verbatim —
/// the double JSON encoding (structured result serialized again as the
/// `content` text) is part of the wire contract, not an implementation
/// choice (spec §9).
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub content: Vec<ContentItem>,
    #[serde(rename = "_meta")]
    pub meta: Meta,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub tool: String,
    pub error: Option<ErrorKind>,
    pub real_slurm: bool,
}

impl ResultEnvelope {
    pub fn ok(tool: &str, real_slurm: bool, result: &Value) -> Self {
        Self {
            content: vec![ContentItem::Text {
                text: result.to_string(),
            }],
            meta: Meta {
                tool: tool.to_string(),
                error: None,
                real_slurm,
            },
            is_error: false,
        }
    }

    pub fn error(tool: &str, real_slurm: bool, kind: ErrorKind, message: &str, detail: Value) -> Self {
        let body = serde_json::json!({ "message": message, "detail": detail });
        Self {
            content: vec![ContentItem::Text {
                text: body.to_string(),
            }],
            meta: Meta {
                tool: tool.to_string(),
                error: Some(kind),
                real_slurm,
            },
            is_error: true,
        }
    }
}

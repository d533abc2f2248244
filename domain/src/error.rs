//! The gateway-wide error taxonomy (spec §7). One enum, one mapping to the
//! `_meta.error` kind string the dispatcher puts on the wire.

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error("invalid resource spec: {0}")]
    InvalidResourceSpec(String),

    #[error("submission rejected: {stderr}")]
    SubmissionRejected { stderr: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("output not ready for job {0}")]
    OutputNotReady(String),

    #[error("output lost for job {0}")]
    OutputLost(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("slurm backend unavailable")]
    BackendUnavailable,

    #[error("server busy")]
    ServerBusy,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The stable string the MCP envelope's `_meta.error` field carries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidParams(_) => ErrorKind::InvalidParams,
            GatewayError::ScriptNotFound(_) => ErrorKind::ScriptNotFound,
            GatewayError::InvalidResourceSpec(_) => ErrorKind::InvalidResourceSpec,
            GatewayError::SubmissionRejected { .. } => ErrorKind::SubmissionRejected,
            GatewayError::JobNotFound(_) => ErrorKind::JobNotFound,
            GatewayError::OutputNotReady(_) => ErrorKind::OutputNotReady,
            GatewayError::OutputLost(_) => ErrorKind::OutputLost,
            GatewayError::Timeout(_) => ErrorKind::Timeout,
            GatewayError::BackendUnavailable => ErrorKind::BackendUnavailable,
            GatewayError::ServerBusy => ErrorKind::ServerBusy,
            GatewayError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    InvalidParams,
    ScriptNotFound,
    InvalidResourceSpec,
    SubmissionRejected,
    JobNotFound,
    OutputNotReady,
    OutputLost,
    Timeout,
    BackendUnavailable,
    ServerBusy,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParams => "InvalidParams",
            ErrorKind::ScriptNotFound => "ScriptNotFound",
            ErrorKind::InvalidResourceSpec => "InvalidResourceSpec",
            ErrorKind::SubmissionRejected => "SubmissionRejected",
            ErrorKind::JobNotFound => "JobNotFound",
            ErrorKind::OutputNotReady => "OutputNotReady",
            ErrorKind::OutputLost => "OutputLost",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::ServerBusy => "ServerBusy",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

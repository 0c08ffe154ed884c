use crate::error::{ErrorKind, NodeError};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Outcome of executing one node.
///
/// `Degraded` carries a best-effort or mock payload produced because the
/// authoritative path was unavailable; it is a success, but never a real one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExecutionResult {
    Ok { data: Value },
    Degraded { data: Value, reason: String },
    #[serde(rename = "error")]
    Err { error: ExecutionError },
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !matches!(self, ExecutionResult::Err { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ExecutionResult::Degraded { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ExecutionResult::Ok { data } | ExecutionResult::Degraded { data, .. } => Some(data),
            ExecutionResult::Err { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            ExecutionResult::Ok { data } | ExecutionResult::Degraded { data, .. } => Some(data),
            ExecutionResult::Err { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        match self {
            ExecutionResult::Err { error } => Some(error),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ExecutionResult::Ok { .. } => "ok",
            ExecutionResult::Degraded { .. } => "degraded",
            ExecutionResult::Err { .. } => "error",
        }
    }
}

/// Failure detail carried by [`ExecutionResult::Err`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub message: String,
    pub kind: ErrorKind,
    pub node_id: String,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ExecutionError {
    /// Annotate `err` with the node it came from.
    pub fn from_node_error(
        err: &NodeError,
        node_id: impl Into<String>,
        node_type: impl Into<String>,
        display_name: &str,
    ) -> Self {
        let node_type = node_type.into();
        let detail = match err {
            NodeError::MissingParameter { scope, names } => Some(serde_json::json!({
                "scope": scope,
                "missing": names,
            })),
            NodeError::HttpStatus { status, .. } => Some(serde_json::json!({ "status": status })),
            _ => None,
        };
        Self {
            message: format!("{} ({}) failed: {}", display_name, node_type, err),
            kind: err.kind(),
            node_id: node_id.into(),
            node_type,
            detail,
        }
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised while validating or executing a single node.
///
/// Validation variants indicate a configuration defect and are never retried.
/// Transport-class variants (`Transport`, `Timeout`, `HttpStatus`, `Api`) come
/// from external collaborators and are retried by [`crate::RetryPolicy::run`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required {scope}: {}", .names.join(", "))]
    MissingParameter {
        scope: &'static str,
        names: Vec<String>,
    },

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unsupported {parameter}: {value}")]
    UnsupportedOperation {
        parameter: String,
        value: String,
    },

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Webhook processing failed: {0}")]
    WebhookProcessing(String),

    #[error("Missing upstream input: {0}")]
    MissingInput(String),

    #[error("Invalid value for '{name}': expected {expected}, got {actual}")]
    InvalidParameter {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("{service} API error: {message}")]
    Api {
        service: String,
        message: String,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl NodeError {
    pub fn missing_parameters(names: Vec<String>) -> Self {
        NodeError::MissingParameter { scope: "parameters", names }
    }

    pub fn missing_credentials(names: Vec<String>) -> Self {
        NodeError::MissingParameter { scope: "credentials", names }
    }

    pub fn unsupported(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        NodeError::UnsupportedOperation {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Whether the Backoff Executor may try the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NodeError::Transport(_)
                | NodeError::Timeout { .. }
                | NodeError::HttpStatus { .. }
                | NodeError::Api { .. }
        )
    }

    /// The service could not be reached or answered with a server-side failure.
    ///
    /// Narrower than [`NodeError::is_retryable`]: an API that answered and
    /// rejected the request is not a transport failure.
    pub fn is_transport_failure(&self) -> bool {
        match self {
            NodeError::Transport(_) | NodeError::Timeout { .. } => true,
            NodeError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::MissingParameter { .. } => ErrorKind::MissingParameter,
            NodeError::UnknownNodeType(_) => ErrorKind::UnknownNodeType,
            NodeError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            NodeError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            NodeError::WebhookProcessing(_) => ErrorKind::WebhookProcessing,
            NodeError::MissingInput(_) => ErrorKind::MissingInput,
            NodeError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            NodeError::Configuration(_) => ErrorKind::Configuration,
            NodeError::Transport(_) => ErrorKind::Transport,
            NodeError::Timeout { .. } => ErrorKind::Timeout,
            NodeError::HttpStatus { .. } => ErrorKind::HttpStatus,
            NodeError::Api { .. } => ErrorKind::Api,
            NodeError::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
        }
    }
}

/// Serializable discriminant of [`NodeError`], carried in failed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MissingParameter,
    UnknownNodeType,
    UnsupportedOperation,
    InvalidAddress,
    WebhookProcessing,
    MissingInput,
    InvalidParameter,
    Configuration,
    Transport,
    Timeout,
    HttpStatus,
    Api,
    ExecutionFailed,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline: {0}")]
    Invalid(String),

    #[error("Duplicate node type: {0}")]
    DuplicateNodeType(String),

    #[error("No executor bound to node type: {0}")]
    UnboundNodeType(String),
}

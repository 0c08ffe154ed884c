use crate::events::{EventBus, EventEmitter, ExecutionId};
use crate::value::{as_number, is_truthy, Parameters, Value};
use crate::{Credentials, NodeError, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Executable logic bound to a node type: an integration adapter or a
/// built-in computation.
#[async_trait]
pub trait Node: Send + Sync {
    /// Type identifier this node executes (e.g. "http-request", "slack")
    fn node_type(&self) -> &str;

    /// Execute the node with given context
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    /// Instance id of the node being executed
    pub node_id: String,

    pub node_type: String,

    /// Resolved parameters (defaults overlaid with the instance's values)
    pub parameters: Parameters,

    pub credentials: Credentials,

    /// Output of the previous node in the pipeline, if any
    pub input: Option<Value>,

    /// Backoff applied around network-bound calls
    pub retry: RetryPolicy,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>, node_type: impl Into<String>, events: EventEmitter) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            parameters: Parameters::new(),
            credentials: Credentials::new(),
            input: None,
            retry: RetryPolicy::default(),
            events,
        }
    }

    /// Context wired to a throwaway event bus, for calling a node directly.
    pub fn detached(node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        let bus = EventBus::new(16);
        let emitter = bus.create_emitter(ExecutionId::new_v4(), node_type.clone());
        Self::new(node_type.clone(), node_type, emitter)
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run a network-bound call under this context's retry policy. Each
    /// backoff is reported as a `Retrying` event.
    pub async fn with_backoff<T, F, Fut>(&self, operation: F) -> Result<T, NodeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        self.retry
            .run_observed(operation, NodeError::is_retryable, |attempt, delay, err| {
                self.events
                    .retrying(attempt, delay.as_millis() as u64, err.to_string())
            })
            .await
    }

    /// Get a required, non-empty parameter or return error
    pub fn require_param(&self, name: &str) -> Result<&Value, NodeError> {
        self.parameters
            .get(name)
            .filter(|v| is_truthy(v))
            .ok_or_else(|| NodeError::missing_parameters(vec![name.to_string()]))
    }

    /// Non-empty string parameter
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.str_param(name).unwrap_or(default)
    }

    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.parameters
            .get(name)
            .and_then(as_number)
            .unwrap_or(default)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.parameters
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Parameter value that is present and not falsy
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).filter(|v| is_truthy(v))
    }

    /// Upstream input, or `MissingInput` naming what the node needed it for
    pub fn require_input(&self, what: &str) -> Result<&Value, NodeError> {
        self.input
            .as_ref()
            .filter(|v| is_truthy(v))
            .ok_or_else(|| NodeError::MissingInput(format!("{} requires {}", self.node_type, what)))
    }
}

/// Output from node execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NodeOutput {
    /// Result of the real integration or computation
    Complete { data: Value },

    /// Best-effort or mock payload; `reason` says why the real path was not used
    Degraded { data: Value, reason: String },
}

impl NodeOutput {
    pub fn complete(data: impl Into<Value>) -> Self {
        NodeOutput::Complete { data: data.into() }
    }

    pub fn degraded(data: impl Into<Value>, reason: impl Into<String>) -> Self {
        NodeOutput::Degraded {
            data: data.into(),
            reason: reason.into(),
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            NodeOutput::Complete { data } | NodeOutput::Degraded { data, .. } => data,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, NodeOutput::Degraded { .. })
    }
}

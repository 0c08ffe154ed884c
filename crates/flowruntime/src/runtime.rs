use crate::{InstanceFactory, NodeDispatcher, NodeRegistry, PipelineExecutor, PipelineReport};
use flowcore::{
    Credentials, EventBus, ExecutionResult, FlowError, InstanceOverrides, Node, NodeConfig,
    NodeError, NodeInstance, Pipeline, RetryPolicy, Value,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Main runtime: registry, factory, dispatcher and pipeline executor wired together
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    factory: Arc<InstanceFactory>,
    dispatcher: Arc<NodeDispatcher>,
    executor: PipelineExecutor,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a runtime over `registry`, binding each node to its type
    pub fn new<I>(registry: Arc<NodeRegistry>, nodes: I, config: RuntimeConfig) -> Result<Self, FlowError>
    where
        I: IntoIterator<Item = Arc<dyn Node>>,
    {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let mut dispatcher = NodeDispatcher::new(registry.clone(), config.retry.clone(), event_bus.clone());
        for node in nodes {
            dispatcher.register(node)?;
        }
        for type_id in dispatcher.unbound_types() {
            tracing::warn!("Node type {} has no executor bound", type_id);
        }

        let factory = Arc::new(InstanceFactory::new(registry.clone()));
        let dispatcher = Arc::new(dispatcher);
        let executor = PipelineExecutor::new(factory.clone(), dispatcher.clone());

        Ok(Self {
            registry,
            factory,
            dispatcher,
            executor,
            event_bus,
            config,
        })
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<NodeDispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn node_config(&self, type_id: &str) -> NodeConfig {
        self.registry.node_config(type_id)
    }

    pub fn create_instance(
        &self,
        type_id: &str,
        overrides: Option<InstanceOverrides>,
    ) -> Result<NodeInstance, NodeError> {
        self.factory.create_instance(type_id, overrides)
    }

    /// Execute a single node instance
    pub async fn execute_node(
        &self,
        instance: &NodeInstance,
        upstream: Option<&Value>,
        credentials: Option<&Credentials>,
    ) -> ExecutionResult {
        self.dispatcher.execute(instance, upstream, credentials).await
    }

    /// Execute a pipeline
    pub async fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        input: Option<Value>,
    ) -> Result<PipelineReport, FlowError> {
        self.executor.execute(pipeline, input).await
    }

    /// Check that every node in `pipeline` refers to a registered type
    pub fn validate_pipeline(&self, pipeline: &Pipeline) -> Result<(), FlowError> {
        self.executor.instantiate(pipeline).map(|_| ())
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<flowcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Backoff applied around every network-bound adapter call
    pub retry: RetryPolicy,
    pub event_buffer_size: usize,
    pub slack_api_base: String,
    pub sheets_api_base: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            event_buffer_size: 1000,
            slack_api_base: "https://slack.com/api".to_string(),
            sheets_api_base: "https://sheets.googleapis.com/v4/spreadsheets".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `FLOW_MAX_ATTEMPTS`, `FLOW_BASE_DELAY_MS` and `FLOW_MAX_DELAY_MS`
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FLOW_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_env("FLOW_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("FLOW_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_env("FLOW_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("FLOW_MAX_DELAY_MS") {
            self.retry.max_delay_ms = Some(parse_env("FLOW_MAX_DELAY_MS", &value)?);
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

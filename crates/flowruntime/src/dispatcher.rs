use crate::registry::NodeRegistry;
use chrono::Utc;
use flowcore::{
    Credentials, EventBus, ExecutionError, ExecutionEvent, ExecutionId, ExecutionResult, Node,
    NodeContext, NodeError, NodeInstance, NodeOutput, NodeTypeDefinition, PipelineError,
    RetryPolicy, Value,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Resolves node instances to executable logic and runs them.
///
/// This is the error boundary for a pipeline step: every failure, including a
/// panicking node, comes back as [`ExecutionResult::Err`].
pub struct NodeDispatcher {
    registry: Arc<NodeRegistry>,
    nodes: HashMap<String, Arc<dyn Node>>,
    retry: RetryPolicy,
    events: Arc<EventBus>,
}

impl NodeDispatcher {
    pub fn new(registry: Arc<NodeRegistry>, retry: RetryPolicy, events: Arc<EventBus>) -> Self {
        Self {
            registry,
            nodes: HashMap::new(),
            retry,
            events,
        }
    }

    /// Bind executable logic to a registered node type
    pub fn register(&mut self, node: Arc<dyn Node>) -> Result<(), PipelineError> {
        let node_type = node.node_type().to_string();
        if !self.registry.contains(&node_type) {
            return Err(PipelineError::Invalid(format!(
                "cannot bind executor for unregistered node type '{}'",
                node_type
            )));
        }
        tracing::info!("Binding executor for node type: {}", node_type);
        self.nodes.insert(node_type, node);
        Ok(())
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn is_bound(&self, type_id: &str) -> bool {
        self.nodes.contains_key(type_id)
    }

    /// Registered types that have no executor bound
    pub fn unbound_types(&self) -> Vec<&str> {
        self.registry
            .list_types()
            .into_iter()
            .filter(|t| !self.nodes.contains_key(*t))
            .collect()
    }

    /// Execute one instance outside of a pipeline run
    pub async fn execute(
        &self,
        instance: &NodeInstance,
        upstream: Option<&Value>,
        credentials: Option<&Credentials>,
    ) -> ExecutionResult {
        self.execute_in(ExecutionId::new_v4(), instance, upstream, credentials)
            .await
    }

    /// Execute one instance as part of the run `execution_id`
    pub async fn execute_in(
        &self,
        execution_id: ExecutionId,
        instance: &NodeInstance,
        upstream: Option<&Value>,
        credentials: Option<&Credentials>,
    ) -> ExecutionResult {
        let start = Instant::now();
        let node_id = instance.id.clone();
        let node_type = instance.type_id.clone();

        self.events.emit(ExecutionEvent::NodeStarted {
            execution_id,
            node_id: node_id.clone(),
            node_type: node_type.clone(),
            timestamp: Utc::now(),
        });

        let (display_name, outcome) = match self.registry.get_definition(&node_type) {
            Some(definition) => {
                let outcome = self
                    .run_node(execution_id, definition, instance, upstream, credentials)
                    .await;
                (definition.display_name.clone(), outcome)
            }
            None => (
                node_type.clone(),
                Err(NodeError::UnknownNodeType(node_type.clone())),
            ),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                let degraded = output.is_degraded();
                tracing::info!(
                    node_id = %node_id,
                    node_type = %node_type,
                    degraded,
                    "Node completed in {}ms",
                    duration_ms
                );
                self.events.emit(ExecutionEvent::NodeCompleted {
                    execution_id,
                    node_id,
                    degraded,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                match output {
                    NodeOutput::Complete { data } => ExecutionResult::Ok { data },
                    NodeOutput::Degraded { data, reason } => {
                        tracing::warn!(node_type = %node_type, "degraded result: {}", reason);
                        ExecutionResult::Degraded { data, reason }
                    }
                }
            }
            Err(err) => {
                let error = ExecutionError::from_node_error(&err, &node_id, &node_type, &display_name);
                tracing::error!(node_id = %node_id, "{}", error.message);
                self.events.emit(ExecutionEvent::NodeFailed {
                    execution_id,
                    node_id,
                    error: error.message.clone(),
                    timestamp: Utc::now(),
                });
                ExecutionResult::Err { error }
            }
        }
    }

    async fn run_node(
        &self,
        execution_id: ExecutionId,
        definition: &NodeTypeDefinition,
        instance: &NodeInstance,
        upstream: Option<&Value>,
        credentials: Option<&Credentials>,
    ) -> Result<NodeOutput, NodeError> {
        let parameters = definition.resolve(&instance.parameters);
        definition.validate(&parameters)?;

        let node = self.nodes.get(&instance.type_id).ok_or_else(|| {
            NodeError::Configuration(format!(
                "no executor bound to node type '{}'",
                instance.type_id
            ))
        })?;

        let ctx = NodeContext {
            node_id: instance.id.clone(),
            node_type: instance.type_id.clone(),
            parameters,
            credentials: credentials.unwrap_or(&instance.credentials).clone(),
            input: upstream.cloned(),
            retry: self.retry.clone(),
            events: self.events.create_emitter(execution_id, instance.id.clone()),
        };

        tracing::debug!(node_id = %instance.id, node_type = %instance.type_id, "dispatching node");

        match AssertUnwindSafe(node.execute(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "node panicked".to_string());
                Err(NodeError::ExecutionFailed(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowcore::{ErrorKind, ParameterSpec};
    use serde_json::json;

    struct EchoNode;

    #[async_trait]
    impl Node for EchoNode {
        fn node_type(&self) -> &str {
            "echo"
        }

        async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::complete(json!({
                "message": ctx.str_or("message", ""),
                "input": ctx.input,
                "token": ctx.credentials.has("token"),
            })))
        }
    }

    struct PanickingNode;

    #[async_trait]
    impl Node for PanickingNode {
        fn node_type(&self) -> &str {
            "explode"
        }

        async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
            panic!("kaboom")
        }
    }

    fn dispatcher() -> NodeDispatcher {
        let registry = NodeRegistry::from_definitions([
            NodeTypeDefinition::new("echo", "Echo")
                .with_parameter(ParameterSpec::string("message", "").required())
                .with_parameter(ParameterSpec::options("mode", &["a", "b"], "a")),
            NodeTypeDefinition::new("explode", "Explode"),
            NodeTypeDefinition::new("unbound", "Unbound"),
        ])
        .unwrap();
        let mut dispatcher =
            NodeDispatcher::new(Arc::new(registry), RetryPolicy::none(), Arc::new(EventBus::new(64)));
        dispatcher.register(Arc::new(EchoNode)).unwrap();
        dispatcher.register(Arc::new(PanickingNode)).unwrap();
        dispatcher
    }

    fn instance(type_id: &str, parameters: serde_json::Value) -> NodeInstance {
        NodeInstance {
            id: format!("{type_id}-1"),
            type_id: type_id.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
            credentials: Credentials::new(),
        }
    }

    #[tokio::test]
    async fn runs_bound_node_with_upstream_input() {
        let result = dispatcher()
            .execute(&instance("echo", json!({"message": "hi"})), Some(&json!([1, 2])), None)
            .await;
        assert_eq!(
            result,
            ExecutionResult::Ok {
                data: json!({"message": "hi", "input": [1, 2], "token": false})
            }
        );
    }

    #[tokio::test]
    async fn explicit_credentials_override_instance() {
        let creds = Credentials::new().with("token", "t");
        let result = dispatcher()
            .execute(&instance("echo", json!({"message": "hi"})), None, Some(&creds))
            .await;
        assert_eq!(result.data().unwrap()["token"], json!(true));
    }

    #[tokio::test]
    async fn unknown_type_becomes_error_result() {
        let result = dispatcher().execute(&instance("ghost", json!({})), None, None).await;
        assert_eq!(result.error().unwrap().kind, ErrorKind::UnknownNodeType);
    }

    #[tokio::test]
    async fn missing_required_parameter_is_reported() {
        let result = dispatcher().execute(&instance("echo", json!({})), None, None).await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::MissingParameter);
        assert!(error.message.contains("message"));
    }

    #[tokio::test]
    async fn option_outside_allowed_set_is_unsupported() {
        let result = dispatcher()
            .execute(&instance("echo", json!({"message": "x", "mode": "z"})), None, None)
            .await;
        assert_eq!(result.error().unwrap().kind, ErrorKind::UnsupportedOperation);
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let result = dispatcher().execute(&instance("explode", json!({})), None, None).await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::ExecutionFailed);
        assert!(error.message.contains("kaboom"));
    }

    #[tokio::test]
    async fn unbound_type_is_a_configuration_error() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.unbound_types(), vec!["unbound"]);
        let result = dispatcher.execute(&instance("unbound", json!({})), None, None).await;
        assert_eq!(result.error().unwrap().kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn emits_lifecycle_events() {
        let dispatcher = dispatcher();
        let mut rx = dispatcher.events().subscribe();
        dispatcher
            .execute(&instance("echo", json!({"message": "hi"})), None, None)
            .await;
        assert!(matches!(rx.recv().await.unwrap(), ExecutionEvent::NodeStarted { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ExecutionEvent::NodeCompleted { degraded: false, .. }
        ));
    }

    #[test]
    fn binding_unregistered_type_fails() {
        let registry = NodeRegistry::from_definitions([NodeTypeDefinition::new("other", "Other")]).unwrap();
        let mut dispatcher =
            NodeDispatcher::new(Arc::new(registry), RetryPolicy::none(), Arc::new(EventBus::new(4)));
        assert!(dispatcher.register(Arc::new(EchoNode)).is_err());
    }
}

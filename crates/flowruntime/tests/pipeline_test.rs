use async_trait::async_trait;
use flowcore::{
    ErrorHandling, ErrorKind, ExecutionEvent, FlowError, Node, NodeContext, NodeError, NodeOutput,
    NodeTypeDefinition, ParameterSpec, Pipeline, PipelineNode, Value,
};
use flowruntime::{FlowRuntime, NodeRegistry, RuntimeConfig};
use serde_json::json;
use std::sync::Arc;

/// Appends its `tag` parameter to the upstream array
struct AppendNode;

#[async_trait]
impl Node for AppendNode {
    fn node_type(&self) -> &str {
        "append"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut items = match &ctx.input {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        items.push(json!(ctx.str_or("tag", "?")));
        Ok(NodeOutput::complete(items))
    }
}

struct FailNode;

#[async_trait]
impl Node for FailNode {
    fn node_type(&self) -> &str {
        "fail"
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("always fails".into()))
    }
}

struct MockNode;

#[async_trait]
impl Node for MockNode {
    fn node_type(&self) -> &str {
        "mock"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::degraded(
            json!({"seen": ctx.input}),
            "no backend configured",
        ))
    }
}

fn create_test_runtime() -> FlowRuntime {
    let registry = NodeRegistry::from_definitions([
        NodeTypeDefinition::new("append", "Append")
            .with_parameter(ParameterSpec::string("tag", "").required()),
        NodeTypeDefinition::new("fail", "Fail"),
        NodeTypeDefinition::new("mock", "Mock"),
    ])
    .unwrap();
    let nodes: Vec<Arc<dyn Node>> = vec![Arc::new(AppendNode), Arc::new(FailNode), Arc::new(MockNode)];
    FlowRuntime::new(Arc::new(registry), nodes, RuntimeConfig::default()).unwrap()
}

fn append(tag: &str) -> PipelineNode {
    PipelineNode::new("append").with_parameter("tag", tag)
}

#[tokio::test]
async fn test_output_chains_between_nodes() {
    let runtime = create_test_runtime();
    let pipeline = Pipeline::new("chain").then(append("a")).then(append("b")).then(append("c"));

    let report = runtime.run_pipeline(&pipeline, Some(json!([]))).await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.output, Some(json!(["a", "b", "c"])));
}

#[tokio::test]
async fn test_stop_pipeline_halts_at_first_failure() {
    let runtime = create_test_runtime();
    let pipeline = Pipeline::new("stops")
        .then(append("a"))
        .then(PipelineNode::new("fail"))
        .then(append("b"));

    let report = runtime.run_pipeline(&pipeline, None).await.unwrap();

    assert!(!report.completed);
    assert!(!report.succeeded());
    assert_eq!(report.steps.len(), 2);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.node_type, "fail");
    assert_eq!(
        failure.result.error().unwrap().kind,
        ErrorKind::ExecutionFailed
    );
}

#[tokio::test]
async fn test_continue_on_error_passes_input_through() {
    let runtime = create_test_runtime();
    let pipeline = Pipeline::new("continues")
        .with_on_error(ErrorHandling::ContinueOnError)
        .then(append("a"))
        .then(PipelineNode::new("fail"))
        .then(append("b"));

    let report = runtime.run_pipeline(&pipeline, None).await.unwrap();

    assert!(report.completed);
    assert!(!report.succeeded());
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.output, Some(json!(["a", "b"])));
}

#[tokio::test]
async fn test_degraded_output_still_chains() {
    let runtime = create_test_runtime();
    let pipeline = Pipeline::new("degraded").then(append("a")).then(PipelineNode::new("mock"));

    let report = runtime.run_pipeline(&pipeline, None).await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.degraded().count(), 1);
    assert_eq!(report.output, Some(json!({"seen": ["a"]})));
}

#[tokio::test]
async fn test_unknown_type_aborts_before_any_node_runs() {
    let runtime = create_test_runtime();
    let mut events = runtime.subscribe_events();
    let pipeline = Pipeline::new("broken").then(append("a")).then(PipelineNode::new("teleport"));

    let err = runtime.run_pipeline(&pipeline, None).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Node(NodeError::UnknownNodeType(ref t)) if t == "teleport"
    ));
    assert!(events.try_recv().is_err(), "no events should be emitted");
}

#[tokio::test]
async fn test_pipeline_events_bracket_node_events() {
    let runtime = create_test_runtime();
    let mut events = runtime.subscribe_events();
    let pipeline = Pipeline::new("events").then(append("a"));

    runtime.run_pipeline(&pipeline, None).await.unwrap();

    assert!(matches!(events.recv().await.unwrap(), ExecutionEvent::PipelineStarted { node_count: 1, .. }));
    assert!(matches!(events.recv().await.unwrap(), ExecutionEvent::NodeStarted { .. }));
    assert!(matches!(events.recv().await.unwrap(), ExecutionEvent::NodeCompleted { .. }));
    assert!(matches!(
        events.recv().await.unwrap(),
        ExecutionEvent::PipelineCompleted { success: true, .. }
    ));
}

#[test]
fn test_pipeline_file_round_trip_defaults() {
    let pipeline: Pipeline = serde_json::from_value(json!({
        "name": "from-file",
        "nodes": [{"type": "append", "parameters": {"tag": "x"}}]
    }))
    .unwrap();
    assert_eq!(pipeline.on_error, ErrorHandling::StopPipeline);
    assert!(create_test_runtime().validate_pipeline(&pipeline).is_ok());
}

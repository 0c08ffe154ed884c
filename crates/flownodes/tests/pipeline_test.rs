mod common;

use common::{init_tracing, CountingMail, ScriptedHttp};
use flowcore::{
    ErrorHandling, ErrorKind, ExecutionResult, InstanceOverrides, NodeError, Pipeline, PipelineNode,
    RetryPolicy, Value,
};
use flownodes::{definitions, runtime_with, Collaborators};
use flowruntime::{FlowRuntime, RuntimeConfig};
use serde_json::json;
use std::sync::Arc;

fn create_test_runtime(http: Arc<ScriptedHttp>) -> FlowRuntime {
    let config = RuntimeConfig {
        retry: RetryPolicy::none(),
        ..RuntimeConfig::default()
    };
    let collaborators = Collaborators::standard(&config)
        .with_http(http)
        .with_mail(Arc::new(CountingMail::live()));
    runtime_with(config, &collaborators).unwrap()
}

#[test]
fn test_every_standard_type_is_registered_and_bound() {
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));
    let registry = runtime.registry();

    assert_eq!(registry.len(), definitions().len());
    for type_id in registry.list_types() {
        assert!(runtime.dispatcher().is_bound(type_id), "{type_id} has no executor");
    }
    assert_eq!(
        registry.list_groups(),
        vec!["analytics", "communication", "data", "input", "integration", "network", "trigger"]
    );
    let analytics: Vec<&str> = registry
        .list_by_group("analytics")
        .iter()
        .map(|d| d.type_id.as_str())
        .collect();
    assert_eq!(
        analytics,
        vec!["review-fetch", "kmeans-cluster", "group-by", "generate-insights", "sheet-export"]
    );
}

#[test]
fn test_node_config_for_known_and_unknown_types() {
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));

    let webhook = runtime.node_config("webhook");
    assert_eq!(webhook.display_name, "Webhook");
    assert_eq!(webhook.defaults.get("path"), Some(&json!("/webhook")));

    let unknown = runtime.node_config("teleporter");
    assert_eq!(unknown.display_name, "Unknown node");
    assert_eq!(unknown.version, 0);
    assert!(unknown.properties.is_empty());
}

#[test]
fn test_standard_instances_carry_shipped_defaults() {
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));

    let webhook = runtime.create_instance("webhook", None).unwrap();
    assert_eq!(webhook.type_id, "webhook");
    assert_eq!(webhook.parameter("path"), Some(&json!("/webhook")));
    assert_eq!(webhook.parameter("httpMethod"), Some(&json!("POST")));
    assert_eq!(webhook.parameter("responseData"), Some(&json!("{}")));
    assert!(webhook.credentials.is_empty());

    let other = runtime.create_instance("webhook", None).unwrap();
    assert_ne!(webhook.id, other.id);

    let err = runtime.create_instance("unknown-type", None).unwrap_err();
    assert!(matches!(err, NodeError::UnknownNodeType(ref t) if t == "unknown-type"));
}

#[tokio::test]
async fn test_missing_required_fields_always_yield_err() {
    init_tracing();
    let http = Arc::new(ScriptedHttp::json(200, json!({"ok": true})));
    let runtime = create_test_runtime(http.clone());

    for definition in definitions() {
        let mut overrides = InstanceOverrides::new();
        for name in definition.required_parameters() {
            overrides = overrides.with_parameter(name, Value::Null);
        }
        let instance = runtime
            .create_instance(&definition.type_id, Some(overrides))
            .unwrap();

        let result = runtime.execute_node(&instance, None, None).await;

        let error = result
            .error()
            .unwrap_or_else(|| panic!("{} should fail, got {:?}", definition.type_id, result));
        assert!(!error.message.is_empty());
        assert_eq!(error.node_type, definition.type_id);
        assert!(
            matches!(error.kind, ErrorKind::MissingParameter | ErrorKind::MissingInput),
            "{}: unexpected {:?}",
            definition.type_id,
            error.kind
        );
    }
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn test_dispatcher_rejects_bogus_sheets_operation() {
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));
    let instance = runtime
        .create_instance(
            "google-sheets",
            Some(InstanceOverrides::new()
                .with_parameter("spreadsheetId", "abc")
                .with_parameter("operation", "bogus")),
        )
        .unwrap();

    let result = runtime.execute_node(&instance, None, None).await;

    let error = result.error().unwrap();
    assert_eq!(error.kind, ErrorKind::UnsupportedOperation);
    assert!(error.message.contains("bogus"));
}

#[tokio::test]
async fn test_dispatcher_tags_sample_sheet_data_as_degraded() {
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));
    let instance = runtime
        .create_instance(
            "google-sheets",
            Some(InstanceOverrides::new().with_parameter("spreadsheetId", "abc")),
        )
        .unwrap();

    let result = runtime.execute_node(&instance, None, None).await;

    assert!(matches!(result, ExecutionResult::Degraded { .. }));
    assert_eq!(result.data().unwrap()["range"], "A1:B2");
}

#[tokio::test]
async fn test_review_analytics_pipeline_end_to_end() {
    init_tracing();
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));
    let pipeline = Pipeline::new("review-analytics")
        .then(PipelineNode::new("review-fetch").with_parameter("source", "app-store").with_parameter("limit", 30))
        .then(PipelineNode::new("kmeans-cluster").with_parameter("k", 3))
        .then(PipelineNode::new("group-by").with_parameter("field", "cluster"))
        .then(PipelineNode::new("generate-insights"))
        .then(PipelineNode::new("sheet-export"))
        .then(
            PipelineNode::new("google-sheets")
                .with_name("Write summary")
                .with_parameter("spreadsheetId", "abc")
                .with_parameter("range", "Summary")
                .with_parameter("operation", "append"),
        );

    let report = runtime.run_pipeline(&pipeline, None).await.unwrap();

    assert!(report.succeeded(), "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.steps.len(), 6);
    let degraded: Vec<&str> = report.degraded().map(|s| s.node_type.as_str()).collect();
    assert_eq!(degraded, vec!["review-fetch", "google-sheets"]);

    let grouped = report.steps[2].result.data().unwrap();
    let total: u64 = grouped["groups"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["count"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 30);

    let insights = report.steps[3].result.data().unwrap();
    assert_eq!(insights["recordCount"], 30);

    let exported = report.steps[4].result.data().unwrap();
    assert_eq!(report.steps[5].name, "Write summary");
    assert_eq!(report.output.as_ref().unwrap()["updatedRows"], exported["rowCount"]);
}

#[tokio::test]
async fn test_continue_on_error_skips_failed_adapter() {
    let runtime = create_test_runtime(Arc::new(ScriptedHttp::json(200, json!({}))));
    let pipeline = Pipeline::new("notify")
        .with_on_error(ErrorHandling::ContinueOnError)
        .then(PipelineNode::new("webhook").with_parameter("responseData", r#"{"orders": 3}"#))
        .then(PipelineNode::new("email-send").with_parameter("to", "not-an-email"))
        .then(PipelineNode::new("sheet-export"));

    let report = runtime.run_pipeline(&pipeline, None).await.unwrap();

    assert!(report.completed);
    assert_eq!(report.failures().count(), 1);
    let output = report.output.unwrap();
    assert!(output["values"]
        .as_array()
        .unwrap()
        .iter()
        .any(|row| row[0] == "method"));
}

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use flowcore::{Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec, Value};
use serde_json::json;

pub const NODE_TYPE: &str = "webhook";

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Webhook")
        .with_description("Start a pipeline from an incoming webhook call")
        .with_group("trigger")
        .with_parameter(ParameterSpec::string("path", "/webhook").required())
        .with_parameter(ParameterSpec::options(
            "httpMethod",
            &["GET", "POST", "PUT", "PATCH", "DELETE"],
            "POST",
        ))
        .with_parameter(ParameterSpec::string("responseData", "{}").describe("JSON payload of the call"))
}

/// Synthesizes the request a webhook trigger would have received
pub struct WebhookNode;

#[async_trait]
impl Node for WebhookNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let path = ctx.str_or("path", "/webhook");
        let method = ctx.str_or("httpMethod", "POST");
        let body: Value = match ctx.parameters.get("responseData") {
            Some(Value::String(text)) if !text.trim().is_empty() => serde_json::from_str(text)
                .map_err(|e| NodeError::WebhookProcessing(format!("responseData is not JSON: {}", e)))?,
            Some(Value::String(_)) | Some(Value::Null) | None => json!({}),
            Some(other) => other.clone(),
        };

        Ok(NodeOutput::complete(json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "method": method,
            "path": path,
            "headers": {
                "content-type": "application/json",
                "user-agent": "WorkflowBot/1.0",
            },
            "body": body,
            "query": {},
        })))
    }
}

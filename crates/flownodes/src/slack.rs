use crate::transport::{HttpRequest, HttpTransport};
use async_trait::async_trait;
use chrono::Utc;
use flowcore::{
    require_params, Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec,
    Value,
};
use serde_json::json;
use std::sync::Arc;

pub const NODE_TYPE: &str = "slack";

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Slack")
        .with_description("Post a message to a Slack channel")
        .with_group("integration")
        .with_group("communication")
        .with_parameter(ParameterSpec::string("channel", "").required())
        .with_parameter(ParameterSpec::string("text", "").required())
        .with_parameter(ParameterSpec::string("username", "Workflow Bot"))
        .with_parameter(ParameterSpec::json("attachments", json!([])))
}

/// Posts to `chat.postMessage`.
///
/// When Slack cannot be reached after every retry the node degrades to a
/// synthetic confirmation; a request Slack answered and rejected stays an error.
pub struct SlackNode {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
}

impl SlackNode {
    pub fn new(transport: Arc<dyn HttpTransport>, api_base: impl Into<String>) -> Self {
        Self {
            transport,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_message(&self, request: HttpRequest) -> Result<Value, NodeError> {
        let response = self.transport.send(request).await?.error_for_status()?;
        let data = response
            .json()
            .ok_or_else(|| NodeError::Transport("Slack returned a non-JSON body".to_string()))?;

        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let message = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(NodeError::Api {
                service: "Slack".to_string(),
                message: message.to_string(),
            });
        }
        Ok(data)
    }
}

#[async_trait]
impl Node for SlackNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        require_params(&ctx.credentials, &["token"])?;
        require_params(&ctx.parameters, &["channel", "text"])?;

        let channel = ctx.str_or("channel", "");
        let text = ctx.str_or("text", "");
        let username = ctx.str_or("username", "Workflow Bot");

        let mut payload = json!({
            "channel": channel,
            "text": text,
            "username": username,
        });
        if let Some(attachments) = ctx.param("attachments") {
            payload["attachments"] = attachments.clone();
        }

        let request = HttpRequest::new("POST", format!("{}/chat.postMessage", self.api_base))
            .bearer(ctx.credentials.get("token").unwrap_or_default())
            .json(&payload);

        ctx.events.info(format!("Posting to Slack channel {}", channel));

        match ctx.with_backoff(|| self.post_message(request.clone())).await {
            Ok(data) => Ok(NodeOutput::complete(data)),
            Err(err) if err.is_transport_failure() => {
                tracing::warn!(channel = %channel, "Slack unreachable, using mock response: {}", err);
                ctx.events.warn(format!("Slack unreachable, returning mock response: {}", err));
                let now = Utc::now();
                let mock = json!({
                    "ok": true,
                    "channel": channel,
                    "ts": format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros()),
                    "message": { "text": text, "username": username },
                    "mock": true,
                });
                Ok(NodeOutput::degraded(mock, err.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

use crate::transport::{parse_url, HttpRequest, HttpTransport};
use async_trait::async_trait;
use base64::Engine;
use flowcore::value::stringify;
use flowcore::{
    require_params, Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec,
    Value,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const NODE_TYPE: &str = "http-request";

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"];

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "HTTP Request")
        .with_description("Make HTTP requests to any JSON API")
        .with_group("integration")
        .with_group("network")
        .with_parameter(ParameterSpec::string("url", "").required())
        .with_parameter(ParameterSpec::options("method", METHODS, "GET"))
        .with_parameter(ParameterSpec::json("headers", json!({})))
        .with_parameter(ParameterSpec::json("body", Value::Null))
        .with_parameter(ParameterSpec::integer("timeoutMs", 30_000).describe("Per-attempt deadline"))
        .with_parameter(ParameterSpec::options(
            "authenticationMode",
            &["none", "basic", "bearer"],
            "none",
        ))
}

/// HTTP request node
pub struct HttpRequestNode {
    transport: Arc<dyn HttpTransport>,
}

impl HttpRequestNode {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn build_request(&self, ctx: &NodeContext) -> Result<HttpRequest, NodeError> {
        require_params(&ctx.parameters, &["url"])?;
        let url = ctx.str_or("url", "");
        parse_url(url)?;
        let method = ctx.str_or("method", "GET").to_uppercase();
        if !METHODS.contains(&method.as_str()) {
            return Err(NodeError::unsupported("method", method));
        }

        let mut request = HttpRequest::new(method.clone(), url)
            .header("Content-Type", "application/json");

        if let Some(Value::Object(headers)) = ctx.param("headers") {
            for (name, value) in headers {
                request = request.header(name.clone(), stringify(value));
            }
        }

        match ctx.str_or("authenticationMode", "none") {
            "none" => {}
            "basic" => {
                require_params(&ctx.credentials, &["user", "password"])?;
                let user = ctx.credentials.get("user").unwrap_or_default();
                let password = ctx.credentials.get("password").unwrap_or_default();
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", user, password));
                request = request.header("Authorization", format!("Basic {}", encoded));
            }
            "bearer" => {
                require_params(&ctx.credentials, &["token"])?;
                request = request.bearer(ctx.credentials.get("token").unwrap_or_default());
            }
            other => return Err(NodeError::unsupported("authenticationMode", other)),
        }

        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            if let Some(body) = ctx.param("body") {
                request.body = Some(stringify(body));
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl Node for HttpRequestNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let millis = ctx.number_or("timeoutMs", 30_000.0).max(1.0) as u64;
        let timeout = Duration::from_millis(millis);
        let request = self.build_request(&ctx)?.timeout(timeout);

        ctx.events.info(format!("{} {}", request.method, request.url));

        let response = ctx
            .with_backoff(|| {
                let transport = self.transport.clone();
                let request = request.clone();
                async move {
                    tokio::time::timeout(timeout, transport.send(request))
                        .await
                        .map_err(|_| NodeError::Timeout { millis })??
                        .error_for_status()
                }
            })
            .await?;

        ctx.events.info(format!("Response status: {}", response.status));

        let body = response
            .json()
            .unwrap_or_else(|| Value::String(response.body.clone()));

        Ok(NodeOutput::complete(json!({
            "statusCode": response.status,
            "headers": response.headers,
            "body": body,
        })))
    }
}

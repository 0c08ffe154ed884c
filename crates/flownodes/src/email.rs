use crate::transport::{MailCredentials, MailTransport, OutgoingEmail};
use async_trait::async_trait;
use flowcore::{
    require_params, Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const NODE_TYPE: &str = "email-send";

const DEFAULT_HOST: &str = "smtp.gmail.com";
const DEFAULT_PORT: u16 = 587;

static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("address pattern compiles"));

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Send Email")
        .with_description("Send an email over SMTP")
        .with_group("integration")
        .with_group("communication")
        .with_parameter(ParameterSpec::string("to", "").required().describe("Comma separated recipients"))
        .with_parameter(ParameterSpec::string("subject", "").required())
        .with_parameter(ParameterSpec::string("body", "").required())
        .with_parameter(ParameterSpec::string("from", "").describe("Defaults to the login user"))
        .with_parameter(ParameterSpec::string("cc", ""))
        .with_parameter(ParameterSpec::string("bcc", ""))
}

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS.is_match(address)
}

/// Split a comma separated list and check every address
fn recipients(list: &str) -> Result<Vec<String>, NodeError> {
    list.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|address| {
            if is_valid_address(address) {
                Ok(address.to_string())
            } else {
                Err(NodeError::InvalidAddress(address.to_string()))
            }
        })
        .collect()
}

pub struct EmailSendNode {
    transport: Arc<dyn MailTransport>,
}

impl EmailSendNode {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Node for EmailSendNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        require_params(&ctx.parameters, &["to", "subject", "body"])?;
        require_params(&ctx.credentials, &["user", "password"])?;

        let raw_to = ctx.str_or("to", "");
        let to = recipients(raw_to)?;
        if to.is_empty() {
            return Err(NodeError::InvalidAddress(raw_to.to_string()));
        }
        let cc = recipients(ctx.str_or("cc", ""))?;
        let bcc = recipients(ctx.str_or("bcc", ""))?;

        let port = match ctx.credentials.get("port") {
            Some(port) => port.trim().parse().map_err(|_| NodeError::InvalidParameter {
                name: "port".to_string(),
                expected: "port number".to_string(),
                actual: port.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let credentials = MailCredentials {
            user: ctx.credentials.get("user").unwrap_or_default().to_string(),
            password: ctx.credentials.get("password").unwrap_or_default().to_string(),
            host: ctx.credentials.get("host").unwrap_or(DEFAULT_HOST).to_string(),
            port,
        };

        let email = OutgoingEmail {
            from: ctx.str_or("from", &credentials.user).to_string(),
            to,
            cc,
            bcc,
            subject: ctx.str_or("subject", "").to_string(),
            body: ctx.str_or("body", "").to_string(),
        };

        ctx.events.info(format!("Sending email to {}", email.to.join(", ")));

        let receipt = ctx
            .with_backoff(|| self.transport.send(&email, &credentials))
            .await?;
        let data = serde_json::to_value(&receipt)
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to encode receipt: {}", e)))?;

        if self.transport.is_live() {
            Ok(NodeOutput::complete(data))
        } else {
            Ok(NodeOutput::degraded(data, "preview transport, message was not delivered"))
        }
    }
}

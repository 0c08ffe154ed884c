//! Standard node library
//!
//! Integration adapters (HTTP, Slack, Google Sheets, email, webhook) and the
//! built-in review analytics nodes, plus the definitions that describe them.

pub mod analytics;
mod email;
mod http;
mod sheets;
mod slack;
pub mod transport;
mod webhook;

pub use analytics::cluster::KMeansClusterNode;
pub use analytics::export::SheetExportNode;
pub use analytics::group::GroupByNode;
pub use analytics::insights::GenerateInsightsNode;
pub use analytics::reviews::ReviewFetchNode;
pub use email::{is_valid_address, EmailSendNode};
pub use http::HttpRequestNode;
pub use sheets::{GoogleSheetsNode, SheetsBackend, SheetsOperation};
pub use slack::SlackNode;
pub use webhook::WebhookNode;

use flowcore::{FlowError, Node, NodeTypeDefinition, PipelineError};
use flowruntime::{FlowRuntime, NodeRegistry, RuntimeConfig};
use std::sync::Arc;
use transport::{AccessTokenSource, HttpTransport, MailTransport, PreviewMailTransport, ReqwestTransport};

/// Definitions of every standard node type, in registration order
pub fn definitions() -> Vec<NodeTypeDefinition> {
    vec![
        http::definition(),
        sheets::definition(),
        slack::definition(),
        email::definition(),
        webhook::definition(),
        analytics::reviews::definition(),
        analytics::cluster::definition(),
        analytics::group::definition(),
        analytics::insights::definition(),
        analytics::export::definition(),
    ]
}

/// Registry holding every standard node type
pub fn standard_registry() -> Result<NodeRegistry, PipelineError> {
    NodeRegistry::from_definitions(definitions())
}

/// External services the adapters talk to
#[derive(Clone)]
pub struct Collaborators {
    pub http: Arc<dyn HttpTransport>,
    pub mail: Arc<dyn MailTransport>,
    pub token_source: Option<Arc<dyn AccessTokenSource>>,
    pub slack_api_base: String,
    pub sheets_api_base: String,
}

impl Collaborators {
    /// reqwest for HTTP, the preview mail transport, and the API bases from `config`
    pub fn standard(config: &RuntimeConfig) -> Self {
        Self {
            http: Arc::new(ReqwestTransport::new()),
            mail: Arc::new(PreviewMailTransport),
            token_source: None,
            slack_api_base: config.slack_api_base.clone(),
            sheets_api_base: config.sheets_api_base.clone(),
        }
    }

    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = http;
        self
    }

    pub fn with_mail(mut self, mail: Arc<dyn MailTransport>) -> Self {
        self.mail = mail;
        self
    }

    pub fn with_token_source(mut self, source: Arc<dyn AccessTokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }
}

/// Executable logic for every standard node type
pub fn nodes(collaborators: &Collaborators) -> Vec<Arc<dyn Node>> {
    let mut sheets = GoogleSheetsNode::new(collaborators.http.clone(), &collaborators.sheets_api_base);
    if let Some(source) = &collaborators.token_source {
        sheets = sheets.with_token_source(source.clone());
    }

    vec![
        Arc::new(HttpRequestNode::new(collaborators.http.clone())),
        Arc::new(sheets),
        Arc::new(SlackNode::new(collaborators.http.clone(), &collaborators.slack_api_base)),
        Arc::new(EmailSendNode::new(collaborators.mail.clone())),
        Arc::new(WebhookNode),
        Arc::new(ReviewFetchNode),
        Arc::new(KMeansClusterNode),
        Arc::new(GroupByNode),
        Arc::new(GenerateInsightsNode),
        Arc::new(SheetExportNode),
    ]
}

/// Runtime with every standard node registered and bound
pub fn runtime_with(config: RuntimeConfig, collaborators: &Collaborators) -> Result<FlowRuntime, FlowError> {
    let registry = Arc::new(standard_registry()?);
    FlowRuntime::new(registry, nodes(collaborators), config)
}

/// Runtime with every standard node and the default collaborators
pub fn standard_runtime(config: RuntimeConfig) -> Result<FlowRuntime, FlowError> {
    let collaborators = Collaborators::standard(&config);
    runtime_with(config, &collaborators)
}

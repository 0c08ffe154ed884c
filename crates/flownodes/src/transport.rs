//! Collaborators the integration adapters talk through.
//!
//! Adapters never reach the network directly; they hold an
//! `Arc<dyn HttpTransport>` (or `MailTransport`) so that tests can script
//! responses and count calls.

use async_trait::async_trait;
use chrono::Utc;
use flowcore::NodeError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Outgoing HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set a header, replacing any existing one with the same name in any case
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// JSON body with a matching content type
    pub fn json(mut self, body: &serde_json::Value) -> Self {
        self = self.header("Content-Type", "application/json");
        self.body = Some(body.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: String::new(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// `HttpStatus` failure for a non-2xx response
    pub fn error_for_status(self) -> Result<Self, NodeError> {
        if self.is_success() {
            Ok(self)
        } else {
            let reason = if self.reason.is_empty() {
                self.body.chars().take(200).collect()
            } else {
                self.reason
            };
            Err(NodeError::HttpStatus {
                status: self.status,
                reason,
            })
        }
    }
}

/// Parse an absolute http(s) URL. A malformed one is a non-retryable
/// `InvalidParameter` on `url`.
pub fn parse_url(raw: &str) -> Result<reqwest::Url, NodeError> {
    let url = reqwest::Url::parse(raw).map_err(|e| invalid_url(raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid_url(raw, format!("unsupported scheme '{}'", other))),
    }
}

fn invalid_url(raw: &str, reason: impl fmt::Display) -> NodeError {
    NodeError::InvalidParameter {
        name: "url".to_string(),
        expected: "an absolute http(s) URL".to_string(),
        actual: format!("'{}' ({})", raw, reason),
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError>;
}

/// `HttpTransport` backed by a shared `reqwest::Client`
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NodeError::unsupported("method", request.method.clone()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                invalid_url(&request.url, e)
            } else if e.is_timeout() {
                NodeError::Timeout {
                    millis: request.timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
                }
            } else {
                NodeError::Transport(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| NodeError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}

/// Message handed to a [`MailTransport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn recipients(&self) -> impl Iterator<Item = &String> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }
}

/// SMTP login for one send
#[derive(Clone, PartialEq)]
pub struct MailCredentials {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub message_id: String,
    pub response: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Whether messages handed to this transport are actually delivered
    fn is_live(&self) -> bool;

    async fn send(
        &self,
        email: &OutgoingEmail,
        credentials: &MailCredentials,
    ) -> Result<DeliveryReceipt, NodeError>;
}

/// Accepts every message without delivering it
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewMailTransport;

#[async_trait]
impl MailTransport for PreviewMailTransport {
    fn is_live(&self) -> bool {
        false
    }

    async fn send(
        &self,
        email: &OutgoingEmail,
        credentials: &MailCredentials,
    ) -> Result<DeliveryReceipt, NodeError> {
        tracing::info!(
            to = ?email.to,
            subject = %email.subject,
            from = %email.from,
            host = %credentials.host,
            port = credentials.port,
            "previewing email"
        );
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Ok(DeliveryReceipt {
            accepted: email.recipients().cloned().collect(),
            rejected: Vec::new(),
            message_id: format!(
                "{}-{}@workflow.local",
                Utc::now().timestamp_millis(),
                &suffix[..9]
            ),
            response: "250 Message accepted for delivery".to_string(),
        })
    }
}

/// Exchanges service-account credentials for an OAuth access token
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self, client_email: &str, private_key: &str) -> Result<String, NodeError>;
}

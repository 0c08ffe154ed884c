// Shared fakes for the adapter tests
#![allow(dead_code)]

use async_trait::async_trait;
use flowcore::{Credentials, NodeContext, NodeError, RetryPolicy, Value};
use flownodes::transport::{
    DeliveryReceipt, HttpRequest, HttpResponse, HttpTransport, MailCredentials, MailTransport,
    OutgoingEmail,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Helper function to create a test context
pub fn create_test_context(node_type: &str, parameters: Value, credentials: Credentials) -> NodeContext {
    NodeContext::detached(node_type)
        .with_parameters(parameters.as_object().cloned().unwrap_or_default())
        .with_credentials(credentials)
        .with_retry(RetryPolicy::new(3, 1000))
}

/// Replays scripted responses in order; the last one repeats
pub struct ScriptedHttp {
    script: Mutex<VecDeque<Result<HttpResponse, NodeError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl ScriptedHttp {
    pub fn new(script: Vec<Result<HttpResponse, NodeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::new(vec![Ok(HttpResponse::new(status, body.to_string()))])
    }

    pub fn failing(err: NodeError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// Every call takes `delay` before answering
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> HttpRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// Mail transport that records every send
pub struct CountingMail {
    pub live: bool,
    failures_left: Mutex<u32>,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl CountingMail {
    pub fn live() -> Self {
        Self::failing_first(0)
    }

    /// Fails the first `failures` sends with a transport error
    pub fn failing_first(failures: u32) -> Self {
        Self {
            live: true,
            failures_left: Mutex::new(failures),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<OutgoingEmail> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MailTransport for CountingMail {
    fn is_live(&self) -> bool {
        self.live
    }

    async fn send(
        &self,
        email: &OutgoingEmail,
        _credentials: &MailCredentials,
    ) -> Result<DeliveryReceipt, NodeError> {
        self.sent.lock().unwrap().push(email.clone());
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(NodeError::Transport("connection reset".into()));
        }
        Ok(DeliveryReceipt {
            accepted: email.recipients().cloned().collect(),
            rejected: Vec::new(),
            message_id: "1@test".into(),
            response: "250 OK".into(),
        })
    }
}

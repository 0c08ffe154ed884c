//! Retry with exponential backoff.
//!
//! Gap `i` (zero based) between attempts is `base_delay_ms * 2^i`, with no
//! jitter. An optional `max_delay_ms` caps individual gaps.

use crate::NodeError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: None,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait before retry number `attempt_index + 1`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let mut delay_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt_index));
        if let Some(cap) = self.max_delay_ms {
            delay_ms = delay_ms.min(cap);
        }
        Duration::from_millis(delay_ms)
    }

    /// Run a node operation, retrying only errors that are retryable.
    ///
    /// Validation failures return immediately; the last transport failure is
    /// returned unchanged once attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, NodeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        self.run_if(operation, NodeError::is_retryable).await
    }

    pub async fn run_if<T, E, F, Fut, P>(&self, operation: F, should_retry: P) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.run_observed(operation, should_retry, |_, _, _| {}).await
    }

    /// Like [`RetryPolicy::run_if`], calling `on_backoff(attempt, delay, err)`
    /// before each wait.
    pub async fn run_observed<T, E, F, Fut, P, O>(
        &self,
        mut operation: F,
        should_retry: P,
        mut on_backoff: O,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        O: FnMut(u32, Duration, &E),
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts || !should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt - 1);
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    on_backoff(attempt, delay, &err);
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Retry any failure of `operation` up to `max_attempts` times.
pub async fn run_with_retry<T, E, F, Fut>(
    operation: F,
    max_attempts: u32,
    base_delay_ms: u64,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy::new(max_attempts, base_delay_ms)
        .run_if(operation, |_| true)
        .await
}

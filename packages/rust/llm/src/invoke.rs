//! Bounded-retry model invocation.
//!
//! Every agent funnels its model calls through [`Invoker::invoke`]. A call
//! counts as failed when the backend errors or when the response handler
//! rejects the output; failed attempts are retried with exponential backoff
//! until the per-agent budget is spent, then handed to an exhaustion handler
//! that builds the terminal error.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use researchkit_shared::{ResearchKitError, Result, RetryConfig};

use crate::cancel::CancelSignal;
use crate::json::{extract_json, extract_json_as};
use crate::model::LanguageModel;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry budget and backoff curve for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 1.5,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay slept after failed attempt `attempt` (0-indexed):
    /// `base_delay * multiplier^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.base_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos.round() as u64)
        } else {
            Duration::MAX
        }
    }
}

// ---------------------------------------------------------------------------
// Failure diagnostics
// ---------------------------------------------------------------------------

/// One failed attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// 1-based attempt index.
    pub attempt: u32,
    pub error: String,
    /// Raw model output, when the call itself succeeded.
    pub response: Option<String>,
}

/// Everything known about an invocation whose budget ran out.
#[derive(Debug)]
pub struct InvocationFailure {
    pub attempts: u32,
    pub records: Vec<AttemptRecord>,
    pub last_error: ResearchKitError,
}

impl InvocationFailure {
    /// Raw text of the most recent response, if the model produced one.
    pub fn last_response(&self) -> Option<&str> {
        self.records.last().and_then(|r| r.response.as_deref())
    }

    /// Wrap into the standard terminal error with the given headline.
    pub fn into_error(self, message: impl Into<String>) -> ResearchKitError {
        let last_response = self.last_response().map(str::to_string);
        ResearchKitError::LlmExhausted {
            attempts: self.attempts,
            message: message.into(),
            last_error: self.last_error.to_string(),
            last_response,
        }
    }
}

// ---------------------------------------------------------------------------
// Invoker
// ---------------------------------------------------------------------------

/// A model plus the retry policy an agent calls it with.
#[derive(Clone)]
pub struct Invoker {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    cancel: Option<CancelSignal>,
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("model", &self.model.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Invoker {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RetryPolicy) -> Self {
        Self {
            model,
            policy,
            cancel: None,
        }
    }

    /// Make backoff sleeps interruptible by `signal`.
    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Call the model until `handle` accepts a response or the budget is spent.
    ///
    /// Returns the first accepted value. After `max_retries` failures the
    /// collected [`InvocationFailure`] is passed to `on_exhausted` and its
    /// result returned as the error. No backoff follows the final attempt.
    #[instrument(skip_all, fields(model = self.model.name(), max_retries = self.policy.max_retries))]
    pub async fn invoke<T, H, E>(&self, prompt: &str, mut handle: H, on_exhausted: E) -> Result<T>
    where
        H: FnMut(&str) -> Result<T>,
        E: FnOnce(InvocationFailure) -> ResearchKitError,
    {
        let max_retries = self.policy.max_retries;
        if max_retries == 0 {
            return Err(ResearchKitError::validation("max_retries must be at least 1"));
        }
        if prompt.trim().is_empty() {
            return Err(ResearchKitError::validation("prompt must not be empty"));
        }

        let mut records = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt = attempt + 1, "calling model");

            let (error, response) = match self.model.complete(prompt).await {
                Ok(raw) => match handle(&raw) {
                    Ok(value) => {
                        if attempt > 0 {
                            info!(attempts = attempt + 1, "model call succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(e) => (e, Some(raw)),
                },
                Err(e) => (e, None),
            };

            warn!(
                attempt = attempt + 1,
                error = %error,
                response = response.as_deref().unwrap_or(""),
                "model attempt failed"
            );
            records.push(AttemptRecord {
                attempt: attempt + 1,
                error: error.to_string(),
                response,
            });

            if attempt + 1 >= max_retries {
                return Err(on_exhausted(InvocationFailure {
                    attempts: attempt + 1,
                    records,
                    last_error: error,
                }));
            }

            let delay = self.policy.delay_for(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "backing off");
            self.pause(delay).await?;
            attempt += 1;
        }
    }

    /// Plain-text mode: any completion is accepted as-is.
    pub async fn call_text(&self, prompt: &str) -> Result<String> {
        self.invoke(
            prompt,
            |raw| Ok(raw.to_string()),
            |failure| failure.into_error("prompt failed"),
        )
        .await
    }

    /// Structured mode: the completion must carry JSON, bare or in a ```` ```json ```` fence.
    pub async fn call_json(&self, prompt: &str) -> Result<Value> {
        self.invoke(prompt, extract_json, |failure| {
            failure.into_error("failed to parse JSON response")
        })
        .await
    }

    /// Structured mode with typed deserialization; shape mismatches are retried too.
    pub async fn call_json_as<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        self.invoke(prompt, extract_json_as::<T>, |failure| {
            failure.into_error("failed to parse JSON response")
        })
        .await
    }

    async fn pause(&self, delay: Duration) -> Result<()> {
        match &self.cancel {
            Some(signal) => signal.sleep(delay).await,
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

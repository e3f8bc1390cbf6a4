//! Provider client with timeout, bounded retry and counters
//!
//! Wraps any [`LlmProvider`]:
//! - every attempt runs under the configured timeout (a timeout is transient)
//! - transient errors are retried up to `retry_attempts` total attempts, with
//!   the configured fixed or exponential delay in between
//! - fatal errors return immediately
//! - a semaphore caps concurrent in-flight calls
//!
//! Counters: one request per attempt, one error per failed attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};

use crate::prompt::Turn;

use super::config::LlmConfig;
use super::provider::LlmProvider;
use super::settings::LlmSettings;
use super::types::ProviderError;

/// Operational counters of a [`ProviderClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider: String,
    pub request_count: u64,
    pub error_count: u64,
    /// Percentage of failed attempts, 0 when nothing was sent
    pub error_rate: f64,
    pub last_model: Option<String>,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    last_model: RwLock<Option<String>>,
}

/// Resilient wrapper around a provider
#[derive(Clone)]
pub struct ProviderClient {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
    limiter: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl ProviderClient {
    /// Client with its own settings built from `config`
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        let permits = config.max_concurrent_requests.max(1);
        Self::with_settings(provider, LlmSettings::new(config), permits)
    }

    /// Client sharing an existing settings handle
    ///
    /// The concurrency limit is fixed here; later changes to
    /// `max_concurrent_requests` do not resize it.
    pub fn with_settings(provider: Arc<dyn LlmProvider>, settings: LlmSettings, permits: usize) -> Self {
        Self {
            provider,
            settings,
            limiter: Arc::new(Semaphore::new(permits.max(1))),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Generate text, applying timeout and retry policy from a settings snapshot
    pub async fn generate(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, ProviderError> {
        let config = self.settings.snapshot().await;
        let request = config.request_config();
        let policy = config.retry_policy();

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::fatal("provider client closed"))?;

        let mut last_err = None;

        for attempt in 0..policy.attempts {
            if attempt > 0 {
                let delay = policy.delay_for(attempt - 1);
                if let Some(ref err) = last_err {
                    tracing::warn!(
                        provider = self.provider.provider_name(),
                        attempt = attempt + 1,
                        max_attempts = policy.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying provider request after transient error"
                    );
                }
                tokio::time::sleep(delay).await;
            }

            self.counters.requests.fetch_add(1, Ordering::Relaxed);
            *self.counters.last_model.write().await = Some(request.model.clone());

            let outcome = match tokio::time::timeout(
                request.timeout,
                self.provider.generate(system_prompt, turns, &request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::transient(format!(
                    "request timed out after {:?}",
                    request.timeout
                ))),
            };

            match outcome {
                Ok(text) => {
                    tracing::debug!(
                        provider = self.provider.provider_name(),
                        model = %request.model,
                        chars = text.len(),
                        "Provider request completed"
                    );
                    return Ok(text);
                }
                Err(err) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    if !err.is_retryable() {
                        tracing::error!(provider = self.provider.provider_name(), error = %err, "Fatal provider error");
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| ProviderError::transient("no attempts made"));
        tracing::error!(
            provider = self.provider.provider_name(),
            attempts = policy.attempts,
            error = %err,
            "Provider retries exhausted"
        );
        Err(err)
    }

    pub async fn stats(&self) -> ProviderStats {
        let requests = self.counters.requests.load(Ordering::Relaxed);
        let errors = self.counters.errors.load(Ordering::Relaxed);
        ProviderStats {
            provider: self.provider.provider_name().to_string(),
            request_count: requests,
            error_count: errors,
            error_rate: if requests == 0 {
                0.0
            } else {
                errors as f64 / requests as f64 * 100.0
            },
            last_model: self.counters.last_model.read().await.clone(),
        }
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider.provider_name())
            .field("available_permits", &self.limiter.available_permits())
            .finish()
    }
}

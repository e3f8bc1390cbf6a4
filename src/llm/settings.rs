//! Runtime-mutable LLM settings
//!
//! Wraps an [`LlmConfig`] so temperature, model or token limits can change
//! while the agent runs (e.g. from a `prompt_update` message).
//!
//! # Example
//!
//! ```ignore
//! let settings = LlmSettings::new(LlmConfig::new("gpt-4"));
//! let handle = settings.clone();
//!
//! // Later, from a UI handler or message handler
//! handle.update(|cfg| cfg.temperature = 0.2).await;
//! ```
//!
//! In-flight calls keep the snapshot they took at call start.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::core::FrameworkResult;

use super::config::LlmConfig;

/// Shared handle to the current configuration
///
/// Cheap to clone; every clone points at the same configuration.
#[derive(Clone, Debug)]
pub struct LlmSettings {
    inner: Arc<RwLock<LlmConfig>>,
}

impl LlmSettings {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the configuration as it is right now
    pub async fn snapshot(&self) -> LlmConfig {
        self.inner.read().await.clone()
    }

    /// Mutate the configuration under the write lock
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut LlmConfig),
    {
        let mut guard = self.inner.write().await;
        f(&mut guard);
        tracing::debug!(model = %guard.model, temperature = guard.temperature, "LLM settings updated");
    }

    /// Apply a partial option map; nothing changes if any option is invalid
    pub async fn apply_options(&self, options: &Map<String, Value>) -> FrameworkResult<()> {
        let mut guard = self.inner.write().await;
        let mut next = guard.clone();
        next.apply_options(options)?;
        *guard = next;
        Ok(())
    }

    pub async fn current_model(&self) -> String {
        self.inner.read().await.model.clone()
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self::new(LlmConfig::default())
    }
}

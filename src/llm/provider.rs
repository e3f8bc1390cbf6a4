//! LLM Provider trait
//!
//! The single external call contract: a system prompt, ordered turns and a
//! request config go in, text comes out. Retry, timeout and counters live in
//! [`ProviderClient`](super::client::ProviderClient), not in providers.

use async_trait::async_trait;

use crate::prompt::Turn;

use super::types::{ProviderError, RequestConfig};

/// A text-generation backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the conversation
    ///
    /// Network, timeout and rate-limit problems should be reported as
    /// [`ProviderError::Transient`]; credential or request problems as
    /// [`ProviderError::Fatal`].
    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        config: &RequestConfig,
    ) -> Result<String, ProviderError>;

    /// Get the provider name (e.g., "openai", "echo").
    fn provider_name(&self) -> &str;
}

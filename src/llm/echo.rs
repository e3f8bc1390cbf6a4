//! Offline provider that echoes the last user turn
//!
//! Useful for demos and tests where no network provider is configured.

use async_trait::async_trait;

use crate::prompt::{Role, Turn};

use super::provider::LlmProvider;
use super::types::{ProviderError, RequestConfig};

#[derive(Debug, Default, Clone)]
pub struct EchoProvider;

impl EchoProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        turns: &[Turn],
        config: &RequestConfig,
    ) -> Result<String, ProviderError> {
        let last_user = turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .ok_or_else(|| ProviderError::fatal("conversation has no user turn"))?;

        Ok(format!("[{}] {}", config.model, last_user.content))
    }

    fn provider_name(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> RequestConfig {
        RequestConfig {
            model: "echo-1".into(),
            temperature: 0.0,
            max_tokens: 16,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_echoes_last_user_turn() {
        let turns = vec![
            Turn::user("first"),
            Turn::assistant("reply"),
            Turn::user("second"),
        ];
        let text = EchoProvider.generate("sys", &turns, &request()).await.unwrap();
        assert_eq!(text, "[echo-1] second");
    }

    #[tokio::test]
    async fn test_no_user_turn_is_fatal() {
        let err = EchoProvider.generate("sys", &[], &request()).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}

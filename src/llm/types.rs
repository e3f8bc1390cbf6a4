//! Provider boundary types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{TaskError, TaskErrorKind};

/// Per-request settings handed to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Errors raised by a provider call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network failure, timeout or rate limiting; worth retrying
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Bad credentials or an invalid request; retrying cannot help
    #[error("Fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn transient(msg: impl Into<String>) -> Self {
        ProviderError::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        ProviderError::Fatal(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

impl From<ProviderError> for TaskError {
    fn from(err: ProviderError) -> Self {
        let kind = match err {
            ProviderError::Transient(_) => TaskErrorKind::ProviderTransient,
            ProviderError::Fatal(_) => TaskErrorKind::ProviderFatal,
        };
        TaskError::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ProviderError::transient("429").is_retryable());
        assert!(!ProviderError::fatal("401").is_retryable());
        assert_eq!(
            ProviderError::fatal("bad key").to_string(),
            "Fatal provider error: bad key"
        );
    }

    #[test]
    fn test_task_error_kind() {
        let err: TaskError = ProviderError::transient("timeout").into();
        assert_eq!(err.kind, TaskErrorKind::ProviderTransient);
        let err: TaskError = ProviderError::fatal("401").into();
        assert_eq!(err.kind, TaskErrorKind::ProviderFatal);
    }
}

//! LLM configuration
//!
//! A flat set of named options. Built in code with `with_*` methods, or loaded
//! from a JSON option map, a JSON file, or `LLM_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{FrameworkError, FrameworkResult};

use super::retry::{Backoff, RetryPolicy};
use super::types::RequestConfig;

/// Configuration for a provider-backed agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider label (informational; the provider object does the talking)
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-attempt timeout in seconds
    pub timeout_secs: f64,
    /// Total attempts per request, including the first
    pub retry_attempts: u32,
    /// Base delay between attempts in seconds
    pub rate_limit_delay_secs: f64,
    pub backoff: Backoff,
    /// Cap on a single backoff delay in seconds
    pub max_backoff_secs: f64,
    /// Concurrent in-flight provider calls per client
    pub max_concurrent_requests: usize,
    /// Conversation turns kept per context before trimming
    pub context_max_turns: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "echo".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 30.0,
            retry_attempts: 3,
            rate_limit_delay_secs: 1.0,
            backoff: Backoff::Fixed,
            max_backoff_secs: 30.0,
            max_concurrent_requests: 10,
            context_max_turns: 100,
        }
    }
}

impl LlmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay_secs = delay.as_secs_f64();
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn with_context_max_turns(mut self, turns: usize) -> Self {
        self.context_max_turns = turns;
        self
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    /// Snapshot of the per-request fields sent to the provider
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            base_delay: secs(self.rate_limit_delay_secs),
            max_delay: secs(self.max_backoff_secs),
            backoff: self.backoff,
        }
    }

    /// Build from a flat option map on top of the defaults
    pub fn from_options(options: &Map<String, Value>) -> FrameworkResult<Self> {
        let mut config = Self::default();
        config.apply_options(options)?;
        Ok(config)
    }

    /// Overwrite the fields named in `options`
    ///
    /// Recognized keys: `provider`, `model`, `temperature`, `max_tokens`,
    /// `timeout`, `retry_attempts`, `rate_limit_delay`, `backoff`,
    /// `max_backoff`, `max_concurrent_requests`, `context_max_turns`.
    /// Durations are seconds. Unrecognized keys are ignored.
    pub fn apply_options(&mut self, options: &Map<String, Value>) -> FrameworkResult<()> {
        for (key, value) in options {
            match key.as_str() {
                "provider" => self.provider = as_string(key, value)?,
                "model" => self.model = as_string(key, value)?,
                "temperature" => self.temperature = as_f64(key, value)? as f32,
                "max_tokens" => self.max_tokens = as_u64(key, value)? as u32,
                "timeout" => self.timeout_secs = as_f64(key, value)?,
                "retry_attempts" => self.retry_attempts = as_u64(key, value)? as u32,
                "rate_limit_delay" => self.rate_limit_delay_secs = as_f64(key, value)?,
                "backoff" => {
                    self.backoff = match as_string(key, value)?.as_str() {
                        "fixed" => Backoff::Fixed,
                        "exponential" => Backoff::Exponential,
                        other => {
                            return Err(FrameworkError::invalid_config(format!(
                                "backoff must be 'fixed' or 'exponential', got '{}'",
                                other
                            )))
                        }
                    }
                }
                "max_backoff" => self.max_backoff_secs = as_f64(key, value)?,
                "max_concurrent_requests" => {
                    self.max_concurrent_requests = as_u64(key, value)? as usize
                }
                "context_max_turns" => self.context_max_turns = as_u64(key, value)? as usize,
                _ => tracing::debug!(option = %key, "Ignoring unrecognized LLM option"),
            }
        }
        Ok(())
    }

    /// Load a JSON object of options from disk
    pub fn from_json_file(path: impl AsRef<Path>) -> FrameworkResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&content)?;
        match value {
            Value::Object(options) => Self::from_options(&options),
            _ => Err(FrameworkError::invalid_config(
                "LLM config file must contain a JSON object",
            )),
        }
    }

    /// Read `LLM_MODEL`, `LLM_TEMPERATURE`, ... from the process environment
    pub fn from_env() -> FrameworkResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build from `LLM_<OPTION>` variables; the suffix is lowercased into the option key
    pub fn from_vars<I>(vars: I) -> FrameworkResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut options = Map::new();
        for (name, raw) in vars {
            let Some(key) = name.strip_prefix("LLM_") else {
                continue;
            };
            let key = key.to_lowercase();
            // Numeric values become JSON numbers; anything else stays a string.
            let value = serde_json::from_str::<Value>(&raw)
                .ok()
                .filter(|v| v.is_number())
                .unwrap_or(Value::String(raw));
            options.insert(key, value);
        }
        Self::from_options(&options)
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

fn as_string(key: &str, value: &Value) -> FrameworkResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FrameworkError::invalid_config(format!("{} must be a string", key)))
}

fn as_f64(key: &str, value: &Value) -> FrameworkResult<f64> {
    value
        .as_f64()
        .filter(|v| *v >= 0.0)
        .ok_or_else(|| FrameworkError::invalid_config(format!("{} must be a non-negative number", key)))
}

fn as_u64(key: &str, value: &Value) -> FrameworkResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| FrameworkError::invalid_config(format!("{} must be a non-negative integer", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.backoff, Backoff::Fixed);
        assert_eq!(config.retry_policy().base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_from_options() {
        let options = json!({
            "model": "claude-3-sonnet",
            "temperature": 0.2,
            "retry_attempts": 5,
            "rate_limit_delay": 0.5,
            "backoff": "exponential",
            "unknown_option": true
        });
        let config = LlmConfig::from_options(options.as_object().unwrap()).unwrap();

        assert_eq!(config.model, "claude-3-sonnet");
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(500));
        assert_eq!(config.backoff, Backoff::Exponential);
    }

    #[test]
    fn test_bad_option_type_rejected() {
        let options = json!({ "max_tokens": "lots" });
        let err = LlmConfig::from_options(options.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, FrameworkError::InvalidConfig(_)));

        let options = json!({ "backoff": "linear" });
        assert!(LlmConfig::from_options(options.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm.json");
        std::fs::write(&path, r#"{"model": "gemini-1.5-pro", "max_tokens": 512}"#).unwrap();

        let config = LlmConfig::from_json_file(&path).unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.max_tokens, 512);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(LlmConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn test_from_vars() {
        let vars = vec![
            ("LLM_MODEL".to_string(), "gpt-4o".to_string()),
            ("LLM_RETRY_ATTEMPTS".to_string(), "4".to_string()),
            ("LLM_TIMEOUT".to_string(), "2.5".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let config = LlmConfig::from_vars(vars).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.retry_attempts, 4);
        assert_eq!(config.timeout(), Duration::from_millis(2500));
    }
}

//! Provider integration
//!
//! - [`LlmProvider`]: the opaque generation call
//! - [`ProviderClient`]: timeout, bounded retry, concurrency limit and counters
//! - [`LlmConfig`] / [`LlmSettings`]: static and runtime-mutable configuration

pub mod client;
pub mod config;
pub mod echo;
pub mod provider;
pub mod retry;
pub mod settings;
pub mod types;

pub use client::{ProviderClient, ProviderStats};
pub use config::LlmConfig;
pub use echo::EchoProvider;
pub use provider::LlmProvider;
pub use retry::{Backoff, RetryPolicy};
pub use settings::LlmSettings;
pub use types::{ProviderError, RequestConfig};

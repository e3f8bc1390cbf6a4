//! Message handler dispatch
//!
//! Handlers are resolved by message topic from a [`HandlerTable`]. Any async
//! closure `Fn(Message, AgentInternals) -> Future<Output = anyhow::Result<()>>`
//! is a handler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Message;
use crate::runtime::AgentInternals;

/// Handles one message type
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message, agent: AgentInternals) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Message, AgentInternals) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: Message, agent: AgentInternals) -> anyhow::Result<()> {
        (self)(message, agent).await
    }
}

/// Topic -> handler table of one agent
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the topic
    pub fn insert<H>(&mut self, topic: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.handlers.insert(topic.into(), Arc::new(handler));
    }

    pub fn remove(&mut self, topic: &str) -> bool {
        self.handlers.remove(topic).is_some()
    }

    pub fn get(&self, topic: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(topic).cloned()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.handlers.contains_key(topic)
    }

    /// Registered topics, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("topics", &self.topics())
            .finish()
    }
}

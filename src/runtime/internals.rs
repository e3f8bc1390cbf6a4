//! AgentInternals - What behaviors and handlers see of their own agent
//!
//! Passed to `AgentBehavior::process_task`, `on_start` and every message
//! handler. It provides methods to:
//! - Send direct or broadcast messages with this agent as sender
//! - Reply to a message (correlated to its id)
//! - Enqueue follow-up tasks on this agent
//! - Query this agent's status

use serde_json::Value;

use crate::broker::MessageBroker;
use crate::core::{FrameworkResult, Message, Task};

use super::handle::{AgentHandle, AgentStatus};

/// Per-agent context for behaviors and handlers
///
/// Cheap to clone.
#[derive(Clone, Debug)]
pub struct AgentInternals {
    handle: AgentHandle,
    broker: MessageBroker,
}

impl AgentInternals {
    /// Created by `Agent`, not directly.
    pub(crate) fn new(handle: AgentHandle, broker: MessageBroker) -> Self {
        Self { handle, broker }
    }

    pub fn agent_id(&self) -> &str {
        self.handle.id()
    }

    pub fn handle(&self) -> &AgentHandle {
        &self.handle
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Publish a message from this agent
    ///
    /// Returns once the broker has accepted it, with the number of inboxes reached.
    pub async fn send_message(
        &self,
        topic: impl Into<String>,
        payload: Value,
        receiver_id: Option<&str>,
    ) -> FrameworkResult<usize> {
        let message = Message::new(
            self.agent_id(),
            receiver_id.map(str::to_string),
            topic,
            payload,
        );
        self.broker.publish(message).await
    }

    /// Send to one agent
    pub async fn send_to(
        &self,
        receiver_id: &str,
        topic: impl Into<String>,
        payload: Value,
    ) -> FrameworkResult<usize> {
        self.send_message(topic, payload, Some(receiver_id)).await
    }

    /// Send to every subscriber of `topic`
    pub async fn broadcast(&self, topic: impl Into<String>, payload: Value) -> FrameworkResult<usize> {
        self.send_message(topic, payload, None).await
    }

    /// Answer `original` directly, correlated to its id
    pub async fn reply(
        &self,
        original: &Message,
        topic: impl Into<String>,
        payload: Value,
    ) -> FrameworkResult<usize> {
        let message = original.reply(self.agent_id(), topic, payload);
        self.broker.publish(message).await
    }

    // =========================================================================
    // Tasks and status
    // =========================================================================

    /// Enqueue a task on this agent
    pub async fn add_task(&self, task: Task) -> FrameworkResult<String> {
        self.handle.add_task(task).await
    }

    pub async fn status(&self) -> AgentStatus {
        self.handle.status().await
    }
}

//! Inter-agent messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An addressed or broadcast unit of communication between agents
///
/// Fields are private so a message cannot change after construction.
/// A message without a receiver is broadcast to every subscriber of its topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: String,
    sender_id: String,
    receiver_id: Option<String>,
    topic: String,
    payload: Value,
    created_at: DateTime<Utc>,
    correlation_id: Option<String>,
}

impl Message {
    /// Create a message addressed to a single agent
    pub fn direct(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        topic: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::build(sender_id.into(), Some(receiver_id.into()), topic.into(), payload)
    }

    /// Create a message for every subscriber of `topic`
    pub fn broadcast(sender_id: impl Into<String>, topic: impl Into<String>, payload: Value) -> Self {
        Self::build(sender_id.into(), None, topic.into(), payload)
    }

    /// Create a message with an optional receiver
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: Option<String>,
        topic: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::build(sender_id.into(), receiver_id, topic.into(), payload)
    }

    fn build(sender_id: String, receiver_id: Option<String>, topic: String, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id,
            receiver_id,
            topic,
            payload,
            created_at: Utc::now(),
            correlation_id: None,
        }
    }

    /// Attach a correlation id (consumes the message, so it stays immutable once shared)
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Build a direct reply to this message, correlated to its id
    pub fn reply(&self, sender_id: impl Into<String>, topic: impl Into<String>, payload: Value) -> Self {
        Message::direct(sender_id, self.sender_id.clone(), topic, payload).with_correlation(&self.id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn receiver_id(&self) -> Option<&str> {
        self.receiver_id.as_deref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// True when the message has no receiver
    pub fn is_broadcast(&self) -> bool {
        self.receiver_id.is_none()
    }
}

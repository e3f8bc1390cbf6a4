//! MessageBroker - Registration, subscriptions and delivery
//!
//! The broker holds a non-owning index of agents ([`WeakAgentHandle`]) and a
//! `topic -> subscribers` map, both behind one `RwLock` so concurrent
//! register/subscribe calls never lose updates. Delivery only appends to the
//! receiver's inbox; the broker never touches agent state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::{AgentState, FrameworkError, FrameworkResult, Message};
use crate::runtime::{AgentHandle, WeakAgentHandle};

/// Acknowledgement returned by [`MessageBroker::register`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub agent_id: String,
    pub registered_at: DateTime<Utc>,
}

/// Broker-side view of a registered agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub name: String,
    pub agent_type: String,
    pub capabilities: Vec<String>,
    #[serde(flatten)]
    pub state: AgentState,
}

#[derive(Default)]
struct Registry {
    agents: HashMap<String, WeakAgentHandle>,
    subscriptions: HashMap<String, HashSet<String>>,
}

impl Registry {
    fn live(&self, agent_id: &str) -> Option<AgentHandle> {
        self.agents.get(agent_id).and_then(WeakAgentHandle::upgrade)
    }
}

/// Shared message router
///
/// Cheap to clone; construct one and pass it to every agent.
#[derive(Clone, Default)]
pub struct MessageBroker {
    inner: Arc<RwLock<Registry>>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register an agent
    ///
    /// Fails with `DuplicateAgent` if a live agent already uses the id.
    pub async fn register(&self, handle: &AgentHandle) -> FrameworkResult<Registration> {
        let mut registry = self.inner.write().await;
        if registry.live(handle.id()).is_some() {
            return Err(FrameworkError::DuplicateAgent(handle.id().to_string()));
        }
        registry
            .agents
            .insert(handle.id().to_string(), handle.downgrade());

        tracing::info!(
            agent_id = %handle.id(),
            name = %handle.name(),
            agent_type = %handle.agent_type(),
            "Agent registered"
        );
        Ok(Registration {
            agent_id: handle.id().to_string(),
            registered_at: Utc::now(),
        })
    }

    /// Remove an agent and all its subscriptions
    ///
    /// Returns whether the agent was registered; unknown ids are a no-op.
    pub async fn unregister(&self, agent_id: &str) -> bool {
        let mut registry = self.inner.write().await;
        let removed = registry.agents.remove(agent_id).is_some();
        registry.subscriptions.retain(|_, subscribers| {
            subscribers.remove(agent_id);
            !subscribers.is_empty()
        });
        if removed {
            tracing::info!(agent_id = %agent_id, "Agent unregistered");
        }
        removed
    }

    pub async fn is_registered(&self, agent_id: &str) -> bool {
        self.inner.read().await.live(agent_id).is_some()
    }

    /// Resolve a registered agent
    pub async fn handle(&self, agent_id: &str) -> Option<AgentHandle> {
        self.inner.read().await.live(agent_id)
    }

    pub async fn agent_count(&self) -> usize {
        let registry = self.inner.read().await;
        registry.agents.values().filter(|weak| weak.upgrade().is_some()).count()
    }

    /// Registered agents, sorted by id
    pub async fn list_agents(&self) -> Vec<AgentInfo> {
        let registry = self.inner.read().await;
        let mut agents: Vec<AgentInfo> = registry
            .agents
            .values()
            .filter_map(WeakAgentHandle::upgrade)
            .map(|handle| AgentInfo {
                agent_id: handle.id().to_string(),
                name: handle.name().to_string(),
                agent_type: handle.agent_type().to_string(),
                capabilities: handle.capabilities().to_vec(),
                state: handle.state(),
            })
            .collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        agents
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe an agent to a topic; subscribing twice is a no-op
    pub async fn subscribe(&self, agent_id: &str, topic: &str) -> FrameworkResult<()> {
        let mut registry = self.inner.write().await;
        if !registry.agents.contains_key(agent_id) {
            return Err(FrameworkError::UnknownAgent(agent_id.to_string()));
        }
        let added = registry
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .insert(agent_id.to_string());
        if added {
            tracing::debug!(agent_id = %agent_id, topic = %topic, "Subscribed");
        }
        Ok(())
    }

    /// Returns whether the agent was subscribed
    pub async fn unsubscribe(&self, agent_id: &str, topic: &str) -> bool {
        let mut registry = self.inner.write().await;
        let Some(subscribers) = registry.subscriptions.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.remove(agent_id);
        if subscribers.is_empty() {
            registry.subscriptions.remove(topic);
        }
        if removed {
            tracing::debug!(agent_id = %agent_id, topic = %topic, "Unsubscribed");
        }
        removed
    }

    /// Current subscribers of a topic, sorted
    pub async fn subscribers(&self, topic: &str) -> Vec<String> {
        let registry = self.inner.read().await;
        let mut ids: Vec<String> = registry
            .subscriptions
            .get(topic)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Topics an agent is subscribed to, sorted
    pub async fn topics_of(&self, agent_id: &str) -> Vec<String> {
        let registry = self.inner.read().await;
        let mut topics: Vec<String> = registry
            .subscriptions
            .iter()
            .filter(|(_, subscribers)| subscribers.contains(agent_id))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Route a message, returning the number of inboxes it reached
    ///
    /// A direct message goes to its receiver only and fails with
    /// `UnknownReceiver` if that agent is not registered. A broadcast goes to
    /// every subscriber of the topic except the sender; a failed delivery to
    /// one subscriber is logged and does not affect the others.
    pub async fn publish(&self, message: Message) -> FrameworkResult<usize> {
        if let Some(receiver_id) = message.receiver_id() {
            let receiver = self.inner.read().await.live(receiver_id);
            let Some(receiver) = receiver else {
                tracing::warn!(
                    message_id = %message.id(),
                    sender_id = %message.sender_id(),
                    receiver_id = %receiver_id,
                    topic = %message.topic(),
                    "Dropping message for unknown receiver"
                );
                return Err(FrameworkError::UnknownReceiver(receiver_id.to_string()));
            };

            let topic = message.topic().to_string();
            return match receiver.deliver(message) {
                Ok(()) => {
                    tracing::trace!(receiver_id = %receiver.id(), topic = %topic, "Delivered direct message");
                    Ok(1)
                }
                Err(e) => {
                    tracing::warn!(receiver_id = %receiver.id(), topic = %topic, error = %e, "Direct delivery failed");
                    Err(e)
                }
            };
        }

        let recipients: Vec<AgentHandle> = {
            let registry = self.inner.read().await;
            registry
                .subscriptions
                .get(message.topic())
                .into_iter()
                .flatten()
                .filter(|agent_id| agent_id.as_str() != message.sender_id())
                .filter_map(|agent_id| registry.live(agent_id))
                .collect()
        };

        let mut delivered = 0;
        for recipient in recipients {
            match recipient.deliver(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    receiver_id = %recipient.id(),
                    topic = %message.topic(),
                    error = %e,
                    "Broadcast delivery skipped"
                ),
            }
        }

        tracing::debug!(
            message_id = %message.id(),
            sender_id = %message.sender_id(),
            topic = %message.topic(),
            delivered,
            "Broadcast published"
        );
        Ok(delivered)
    }
}

impl std::fmt::Debug for MessageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBroker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, WorkerAgent};
    use crate::runtime::Agent;
    use serde_json::json;

    async fn agent(broker: &MessageBroker, id: &str) -> Agent {
        Agent::new(AgentConfig::new(id).with_id(id), Arc::new(WorkerAgent::new()), broker.clone())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let broker = MessageBroker::new();
        let b = agent(&broker, "b").await;
        let _a = agent(&broker, "a").await;

        assert_eq!(broker.agent_count().await, 2);
        let listed: Vec<String> = broker.list_agents().await.into_iter().map(|i| i.agent_id).collect();
        assert_eq!(listed, vec!["a", "b"]);

        let err = broker.register(b.handle()).await.unwrap_err();
        assert!(matches!(err, FrameworkError::DuplicateAgent(id) if id == "b"));
    }

    #[tokio::test]
    async fn test_unregister_clears_subscriptions() {
        let broker = MessageBroker::new();
        let _a = agent(&broker, "a").await;
        broker.subscribe("a", "news").await.unwrap();
        assert_eq!(broker.topics_of("a").await, vec!["news", "work_request"]);

        assert!(broker.unregister("a").await);
        assert!(!broker.unregister("a").await);
        assert!(broker.subscribers("news").await.is_empty());
        assert!(!broker.is_registered("a").await);
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_checked() {
        let broker = MessageBroker::new();
        let _a = agent(&broker, "a").await;

        broker.subscribe("a", "news").await.unwrap();
        broker.subscribe("a", "news").await.unwrap();
        assert_eq!(broker.subscribers("news").await, vec!["a"]);

        let err = broker.subscribe("ghost", "news").await.unwrap_err();
        assert!(matches!(err, FrameworkError::UnknownAgent(_)));

        assert!(broker.unsubscribe("a", "news").await);
        assert!(!broker.unsubscribe("a", "news").await);
    }

    #[tokio::test]
    async fn test_direct_to_unknown_receiver() {
        let broker = MessageBroker::new();
        let err = broker
            .publish(Message::direct("a", "ghost", "ping", json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::UnknownReceiver(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender_and_stopped_subscribers() {
        let broker = MessageBroker::new();
        let a = agent(&broker, "a").await;
        let b = agent(&broker, "b").await;
        let c = agent(&broker, "c").await;
        for id in ["a", "b", "c"] {
            broker.subscribe(id, "news").await.unwrap();
        }

        let reached = broker
            .publish(Message::broadcast("a", "news", json!("hello")))
            .await
            .unwrap();
        assert_eq!(reached, 2);

        c.stop().await.unwrap();
        let reached = broker
            .publish(Message::broadcast("a", "news", json!("again")))
            .await
            .unwrap();
        assert_eq!(reached, 1);

        let reached = broker
            .publish(Message::broadcast("b", "nobody-listens", json!(null)))
            .await
            .unwrap();
        assert_eq!(reached, 0);
        drop((a, b));
    }

    #[tokio::test]
    async fn test_dropped_agent_is_not_live() {
        let broker = MessageBroker::new();
        let a = agent(&broker, "a").await;
        drop(a);

        assert_eq!(broker.agent_count().await, 0);
        assert!(broker.handle("a").await.is_none());
        let _again = agent(&broker, "a").await;
        assert_eq!(broker.agent_count().await, 1);
    }
}

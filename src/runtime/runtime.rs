//! AgentRuntime - Owns the broker and a set of agents
//!
//! The `AgentRuntime` is the caller-facing API (e.g. for an HTTP front door):
//! - Spawning agents with a shared broker
//! - Starting and stopping all agents
//! - Creating tasks and polling their status by id
//! - Status snapshots for an observability sink

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::agent::{AgentBehavior, AgentConfig};
use crate::broker::MessageBroker;
use crate::core::{FrameworkError, FrameworkResult, Task, TaskError, TaskStatus};

use super::agent::Agent;
use super::handle::AgentStatus;

/// Status of a task as seen by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    /// Agent that currently owns the task
    pub agent_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskReport {
    fn from_task(agent_id: &str, task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_id: agent_id.to_string(),
            status: task.status(),
            result: task.result().cloned(),
            error: task.error().cloned(),
        }
    }
}

fn progress(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Pending => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Completed | TaskStatus::Failed => 2,
    }
}

/// Runtime for spawning and managing agents
///
/// Cheap to clone; clones share the same broker and agent table.
#[derive(Clone, Default)]
pub struct AgentRuntime {
    broker: MessageBroker,
    agents: Arc<RwLock<HashMap<String, Arc<Agent>>>>,
    entry_agent: Arc<RwLock<Option<String>>>,
}

impl AgentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime around an existing broker
    pub fn with_broker(broker: MessageBroker) -> Self {
        Self {
            broker,
            ..Self::default()
        }
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    /// Create an agent on this runtime's broker
    ///
    /// The agent is registered but not started.
    pub async fn spawn<B>(&self, config: AgentConfig, behavior: Arc<B>) -> FrameworkResult<Arc<Agent>>
    where
        B: AgentBehavior,
    {
        let agent = Arc::new(Agent::new(config, behavior, self.broker.clone()).await?);
        self.agents
            .write()
            .await
            .insert(agent.id().to_string(), agent.clone());
        Ok(agent)
    }

    pub async fn agent(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    fn unknown(agent_id: &str) -> FrameworkError {
        FrameworkError::UnknownAgent(agent_id.to_string())
    }

    async fn require(&self, agent_id: &str) -> FrameworkResult<Arc<Agent>> {
        self.agent(agent_id).await.ok_or_else(|| Self::unknown(agent_id))
    }

    /// Agent ids, sorted
    pub async fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn all_agents(&self) -> Vec<Arc<Agent>> {
        let mut agents: Vec<Arc<Agent>> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.id().cmp(b.id()));
        agents
    }

    /// Route `create_task` to this agent
    pub async fn set_entry_agent(&self, agent_id: &str) -> FrameworkResult<()> {
        self.require(agent_id).await?;
        *self.entry_agent.write().await = Some(agent_id.to_string());
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start every agent that is idle or stopped
    pub async fn start_all(&self) -> FrameworkResult<()> {
        for agent in self.all_agents().await {
            if agent.state().can_start() {
                agent.start().await?;
            }
        }
        Ok(())
    }

    /// Stop every agent; failures are logged and do not stop the sweep
    pub async fn stop_all(&self) {
        for agent in self.all_agents().await {
            if let Err(e) = agent.stop().await {
                tracing::warn!(agent_id = %agent.id(), error = %e, "Failed to stop agent");
            }
        }
    }

    /// Stop an agent, unregister it and forget it
    pub async fn remove(&self, agent_id: &str) -> FrameworkResult<()> {
        let agent = self
            .agents
            .write()
            .await
            .remove(agent_id)
            .ok_or_else(|| Self::unknown(agent_id))?;
        agent.stop().await?;
        self.broker.unregister(agent_id).await;

        let mut entry = self.entry_agent.write().await;
        if entry.as_deref() == Some(agent_id) {
            *entry = None;
        }
        Ok(())
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Create a task on the entry agent and return its id
    pub async fn create_task(
        &self,
        name: impl Into<String>,
        payload: Map<String, Value>,
        priority: i32,
    ) -> FrameworkResult<String> {
        let entry = self
            .entry_agent
            .read()
            .await
            .clone()
            .ok_or_else(|| FrameworkError::invalid_config("no entry agent configured"))?;
        let task = Task::new(name).with_payload(payload).with_priority(priority);
        self.create_task_for(&entry, task).await
    }

    /// Enqueue a prepared task on a specific agent
    pub async fn create_task_for(&self, agent_id: &str, task: Task) -> FrameworkResult<String> {
        self.require(agent_id).await?.add_task(task).await
    }

    /// Where a task is and how far it got
    ///
    /// Looks across all agents, so delegated tasks are found on their new owner.
    pub async fn task_status(&self, task_id: &str) -> Option<TaskReport> {
        let mut best: Option<TaskReport> = None;
        for agent in self.all_agents().await {
            if let Some(task) = agent.task(task_id).await {
                let report = TaskReport::from_task(agent.id(), &task);
                if best
                    .as_ref()
                    .map_or(true, |b| progress(report.status) > progress(b.status))
                {
                    best = Some(report);
                }
            }
        }
        best
    }

    /// Remove and return a finished task from whichever agent holds it
    pub async fn take_task(&self, task_id: &str) -> Option<Task> {
        for agent in self.all_agents().await {
            if let Some(task) = agent.handle().take_task(task_id).await {
                return Some(task);
            }
        }
        None
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn agent_status(&self, agent_id: &str) -> FrameworkResult<AgentStatus> {
        Ok(self.require(agent_id).await?.status().await)
    }

    /// One status record per agent, sorted by id
    pub async fn snapshots(&self) -> Vec<AgentStatus> {
        let mut snapshots = Vec::new();
        for agent in self.all_agents().await {
            snapshots.push(agent.status().await);
        }
        snapshots
    }
}

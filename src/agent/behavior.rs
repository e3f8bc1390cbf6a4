//! Pluggable agent behavior
//!
//! An [`Agent`](crate::runtime::Agent) supplies the lifecycle, the queue and
//! both loops; an [`AgentBehavior`] supplies what the agent actually does with a
//! task, which topics it listens to and which extra handlers it installs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Task, TaskError};
use crate::runtime::AgentInternals;

use super::handler::HandlerTable;

/// What became of a processed task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Finished here with a result
    Completed(Value),
    /// Handed to another agent's queue; this agent no longer owns it
    Delegated { agent_id: String },
}

impl TaskOutcome {
    pub fn completed(result: impl Into<Value>) -> Self {
        TaskOutcome::Completed(result.into())
    }
}

/// Behavior of a concrete agent variant
///
/// `process_task` is never called concurrently on one agent, but handlers
/// run on the separate message loop and may interleave with it.
#[async_trait]
pub trait AgentBehavior: Send + Sync + 'static {
    /// Type tag reported in status records
    fn agent_type(&self) -> &str;

    /// Capabilities declared to coordinators
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Topics subscribed at construction
    fn subscriptions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Add behavior-specific message handlers
    fn install(self: Arc<Self>, _handlers: &mut HandlerTable) {}

    /// Called once per `start()`, after the loops are running
    async fn on_start(&self, _agent: &AgentInternals) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process_task(&self, task: &Task, agent: &AgentInternals) -> Result<TaskOutcome, TaskError>;

    /// Extra fields for status records
    async fn extended_status(&self) -> Option<Value> {
        None
    }
}

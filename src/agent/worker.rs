//! WorkerAgent - executes tasks itself
//!
//! Announces its capabilities with an `agent_registration` broadcast on start
//! and turns every `work_request` message into a priority-1 task. The task
//! body is a pluggable async closure.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::core::topics::{AGENT_REGISTRATION, WORK_REQUEST};
use crate::core::{Message, Task, TaskError};
use crate::runtime::AgentInternals;

use super::behavior::{AgentBehavior, TaskOutcome};
use super::handler::HandlerTable;

/// Capabilities a worker declares unless told otherwise
pub const DEFAULT_WORKER_CAPABILITIES: [&str; 2] = ["data_processing", "computation"];

type WorkFn = Arc<dyn Fn(Task, AgentInternals) -> BoxFuture<'static, Result<Value, TaskError>> + Send + Sync>;

/// Behavior of a task-executing agent
pub struct WorkerAgent {
    capabilities: Vec<String>,
    work: WorkFn,
}

impl WorkerAgent {
    /// Worker with the default capabilities and a body that reports completion
    pub fn new() -> Self {
        Self {
            capabilities: DEFAULT_WORKER_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            work: Arc::new(|task: Task, agent: AgentInternals| -> BoxFuture<'static, Result<Value, TaskError>> {
                Box::pin(async move {
                    Ok(json!(format!("Task {} completed by {}", task.name, agent.handle().name())))
                })
            }),
        }
    }

    /// Replace the declared capabilities
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the task body
    pub fn with_work<F, Fut>(mut self, work: F) -> Self
    where
        F: Fn(Task, AgentInternals) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        self.work = Arc::new(
            move |task: Task, agent: AgentInternals| -> BoxFuture<'static, Result<Value, TaskError>> {
                Box::pin(work(task, agent))
            },
        );
        self
    }
}

impl Default for WorkerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentBehavior for WorkerAgent {
    fn agent_type(&self) -> &str {
        "worker"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn subscriptions(&self) -> Vec<String> {
        vec![WORK_REQUEST.to_string()]
    }

    fn install(self: Arc<Self>, handlers: &mut HandlerTable) {
        handlers.insert(WORK_REQUEST, handle_work_request);
    }

    async fn on_start(&self, agent: &AgentInternals) -> anyhow::Result<()> {
        let announcement = json!({
            "type": "worker",
            "capabilities": agent.handle().capabilities(),
        });
        let reached = agent.broadcast(AGENT_REGISTRATION, announcement).await?;
        tracing::debug!(agent_id = %agent.agent_id(), reached, "Worker announced");
        Ok(())
    }

    async fn process_task(&self, task: &Task, agent: &AgentInternals) -> Result<TaskOutcome, TaskError> {
        let result = (self.work)(task.clone(), agent.clone()).await?;
        Ok(TaskOutcome::Completed(result))
    }
}

async fn handle_work_request(message: Message, agent: AgentInternals) -> anyhow::Result<()> {
    let work_data = message.payload().clone();
    let description = match &work_data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let task = Task::new(format!("Work from {}", message.sender_id()))
        .with_description(description)
        .with_priority(1)
        .with_field("work_data", work_data);

    let task_id = agent.add_task(task).await?;
    tracing::debug!(agent_id = %agent.agent_id(), task_id = %task_id, sender_id = %message.sender_id(), "Work request queued");
    Ok(())
}

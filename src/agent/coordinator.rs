//! CoordinatorAgent - delegates tasks to capable workers
//!
//! Keeps its own worker directory, fed by `agent_registration` broadcasts or
//! [`CoordinatorAgent::register_worker`]. The directory may lag the broker:
//! workers that are gone or stopped are skipped at delegation time.
//!
//! Selection: every worker whose capabilities cover the task's
//! `required_capabilities` is eligible; the one with the fewest pending plus
//! in-progress tasks wins, ties broken by lowest id.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::core::topics::AGENT_REGISTRATION;
use crate::core::{FrameworkError, Message, Task, TaskError};
use crate::runtime::{AgentHandle, AgentInternals};

use super::behavior::{AgentBehavior, TaskOutcome};
use super::handler::HandlerTable;

/// Behavior of a delegating agent
#[derive(Debug, Default)]
pub struct CoordinatorAgent {
    workers: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl CoordinatorAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a worker's capabilities
    pub async fn register_worker<I, S>(&self, worker_id: impl Into<String>, capabilities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let worker_id = worker_id.into();
        let capabilities: BTreeSet<String> = capabilities.into_iter().map(Into::into).collect();
        tracing::info!(worker_id = %worker_id, capabilities = ?capabilities, "Worker registered with coordinator");
        self.workers.write().await.insert(worker_id, capabilities);
    }

    pub async fn forget_worker(&self, worker_id: &str) -> bool {
        self.workers.write().await.remove(worker_id).is_some()
    }

    /// Known workers and their capabilities, by id
    pub async fn workers(&self) -> Vec<(String, Vec<String>)> {
        self.workers
            .read()
            .await
            .iter()
            .map(|(id, caps)| (id.clone(), caps.iter().cloned().collect()))
            .collect()
    }

    /// Workers covering `required`, in id order
    async fn eligible(&self, required: &[String]) -> Vec<String> {
        self.workers
            .read()
            .await
            .iter()
            .filter(|(_, caps)| required.iter().all(|need| caps.contains(need)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Least-loaded live eligible worker
    async fn select_worker(&self, agent: &AgentInternals, required: &[String]) -> Option<AgentHandle> {
        let mut best: Option<(usize, AgentHandle)> = None;
        for worker_id in self.eligible(required).await {
            if worker_id == agent.agent_id() {
                continue;
            }
            let Some(worker) = agent.broker().handle(&worker_id).await else {
                tracing::debug!(worker_id = %worker_id, "Skipping unregistered worker");
                continue;
            };
            if !worker.state().accepts_tasks() {
                continue;
            }
            let load = worker.load().await;
            if best.as_ref().map_or(true, |(best_load, _)| load < *best_load) {
                best = Some((load, worker));
            }
        }
        best.map(|(_, worker)| worker)
    }

    async fn on_registration(&self, message: &Message) -> anyhow::Result<()> {
        let payload = message.payload();
        if payload.get("type").and_then(Value::as_str) != Some("worker") {
            tracing::debug!(sender_id = %message.sender_id(), "Ignoring non-worker registration");
            return Ok(());
        }
        let capabilities: Vec<String> = payload
            .get("capabilities")
            .and_then(Value::as_array)
            .map(|caps| caps.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        self.register_worker(message.sender_id(), capabilities).await;
        Ok(())
    }
}

#[async_trait]
impl AgentBehavior for CoordinatorAgent {
    fn agent_type(&self) -> &str {
        "coordinator"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["coordination".to_string(), "task_distribution".to_string()]
    }

    fn subscriptions(&self) -> Vec<String> {
        vec![AGENT_REGISTRATION.to_string()]
    }

    fn install(self: Arc<Self>, handlers: &mut HandlerTable) {
        handlers.insert(AGENT_REGISTRATION, move |message: Message, _agent: AgentInternals| {
            let coordinator = self.clone();
            async move { coordinator.on_registration(&message).await }
        });
    }

    async fn process_task(&self, task: &Task, agent: &AgentInternals) -> Result<TaskOutcome, TaskError> {
        let required = task.required_capabilities();
        let Some(worker) = self.select_worker(agent, &required).await else {
            return Err(FrameworkError::NoEligibleAgent(required).into());
        };

        worker
            .add_task(task.reassigned())
            .await
            .map_err(|e| TaskError::processing(format!("delegation to {} failed: {}", worker.id(), e)))?;

        Ok(TaskOutcome::Delegated {
            agent_id: worker.id().to_string(),
        })
    }

    async fn extended_status(&self) -> Option<Value> {
        Some(json!({ "workers": self.workers.read().await.len() }))
    }
}

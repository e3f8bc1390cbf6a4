//! AgentHandle - Shared view of a single agent
//!
//! The `AgentHandle` is what the broker, other agents, the runtime facade and
//! tests hold to interact with an agent without owning it. It provides:
//! - Task intake (`add_task`) and the task ledger (`task`, `take_task`)
//! - Inbox delivery for the broker (`deliver`)
//! - State and status queries
//!
//! The broker keeps only a [`WeakAgentHandle`]; the [`Agent`](super::Agent)
//! that created the handle owns it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::agent::AgentBehavior;
use crate::core::{AgentState, FrameworkError, FrameworkResult, Message, Task, TaskError, TaskStatus};

use super::channels::{create_state_channel, InboxSender, StateReceiver, StateSender};
use super::queue::TaskQueue;

/// Read-only status record of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub name: String,
    pub agent_type: String,
    #[serde(flatten)]
    pub state: AgentState,
    pub capabilities: Vec<String>,
    /// Tasks waiting in the queue
    pub queue_depth: usize,
    pub in_progress: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Tasks handed to another agent (coordinators only)
    pub delegated_tasks: u64,
    /// Behavior-specific fields, e.g. provider counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<Value>,
}

pub(crate) struct AgentShared {
    id: String,
    name: String,
    agent_type: String,
    capabilities: Vec<String>,
    behavior: Arc<dyn AgentBehavior>,
    queue: TaskQueue,
    ledger: RwLock<HashMap<String, Task>>,
    inbox_tx: InboxSender,
    state_tx: StateSender,
    completed: AtomicU64,
    failed: AtomicU64,
    delegated: AtomicU64,
}

/// Handle for interacting with an agent
///
/// Cheap to clone; every clone refers to the same agent.
#[derive(Clone)]
pub struct AgentHandle {
    shared: Arc<AgentShared>,
}

/// Non-owning handle, as held by the broker
#[derive(Clone)]
pub struct WeakAgentHandle {
    shared: Weak<AgentShared>,
}

impl WeakAgentHandle {
    pub fn upgrade(&self) -> Option<AgentHandle> {
        self.shared.upgrade().map(|shared| AgentHandle { shared })
    }
}

impl AgentHandle {
    /// Create a new agent handle
    ///
    /// Called by `Agent::new()`, not directly.
    pub(crate) fn new(
        id: String,
        name: String,
        agent_type: String,
        capabilities: Vec<String>,
        behavior: Arc<dyn AgentBehavior>,
        inbox_tx: InboxSender,
    ) -> Self {
        Self {
            shared: Arc::new(AgentShared {
                id,
                name,
                agent_type,
                capabilities,
                behavior,
                queue: TaskQueue::new(),
                ledger: RwLock::new(HashMap::new()),
                inbox_tx,
                state_tx: create_state_channel(),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                delegated: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn agent_type(&self) -> &str {
        &self.shared.agent_type
    }

    pub fn capabilities(&self) -> &[String] {
        &self.shared.capabilities
    }

    pub fn downgrade(&self) -> WeakAgentHandle {
        WeakAgentHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub(crate) fn behavior(&self) -> &Arc<dyn AgentBehavior> {
        &self.shared.behavior
    }

    pub(crate) fn queue(&self) -> &TaskQueue {
        &self.shared.queue
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Get the current state
    pub fn state(&self) -> AgentState {
        self.shared.state_tx.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe_state(&self) -> StateReceiver {
        self.shared.state_tx.subscribe()
    }

    /// Replace the state, returning the previous one
    pub(crate) fn set_state(&self, state: AgentState) -> AgentState {
        self.shared.state_tx.send_replace(state)
    }

    /// Enter `Error` unless the agent has been stopped meanwhile
    pub(crate) fn fault(&self, message: impl Into<String>) {
        let message = message.into();
        let entered = self.shared.state_tx.send_if_modified(|state| {
            if matches!(state, AgentState::Stopped) {
                false
            } else {
                *state = AgentState::error(message.clone());
                true
            }
        });
        if entered {
            tracing::error!(agent_id = %self.id(), error = %message, "Agent entered error state");
        }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Enqueue a task, returning its id
    ///
    /// Fails with `AgentStopped` once the agent is stopped, and with
    /// `DuplicateTask` if the ledger already holds the id.
    pub async fn add_task(&self, task: Task) -> FrameworkResult<String> {
        if !self.state().accepts_tasks() {
            return Err(FrameworkError::AgentStopped(self.id().to_string()));
        }

        let task_id = task.id.clone();
        let priority = task.priority;

        let mut ledger = self.shared.ledger.write().await;
        if ledger.contains_key(&task_id) {
            return Err(FrameworkError::DuplicateTask(task_id));
        }
        tracing::debug!(
            agent_id = %self.id(),
            task_id = %task_id,
            task_name = %task.name,
            priority,
            "Task queued"
        );

        ledger.insert(task_id.clone(), task);
        drop(ledger);
        self.shared.queue.push(task_id.clone(), priority).await;
        Ok(task_id)
    }

    /// Look up a task this agent owns
    pub async fn task(&self, task_id: &str) -> Option<Task> {
        self.shared.ledger.read().await.get(task_id).cloned()
    }

    /// Remove and return a finished task; pending or running tasks stay put
    pub async fn take_task(&self, task_id: &str) -> Option<Task> {
        let mut ledger = self.shared.ledger.write().await;
        match ledger.get(task_id) {
            Some(task) if task.status().is_terminal() => ledger.remove(task_id),
            _ => None,
        }
    }

    /// Tasks still waiting to run, in the order the task loop will take them
    ///
    /// A task already popped but not yet started comes first.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        let order = self.shared.queue.ordered_ids().await;
        let rank: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut pending: Vec<Task> = self
            .shared
            .ledger
            .read()
            .await
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|task| rank.get(task.id.as_str()).copied());
        pending
    }

    /// Pending plus in-progress tasks
    pub async fn load(&self) -> usize {
        self.shared
            .ledger
            .read()
            .await
            .values()
            .filter(|task| !task.status().is_terminal())
            .count()
    }

    pub async fn queue_depth(&self) -> usize {
        self.shared.queue.len().await
    }

    /// Mark a queued task in progress and hand back a copy to process
    ///
    /// Returns `None` if the task was taken or already started.
    pub(crate) async fn begin_task(&self, task_id: &str) -> Option<Task> {
        let mut ledger = self.shared.ledger.write().await;
        let task = ledger.get_mut(task_id)?;
        task.start().ok()?;
        Some(task.clone())
    }

    /// Record the outcome of a processed task
    pub(crate) async fn finish_task(&self, mut task: Task, outcome: Result<Value, TaskError>) {
        let recorded = match outcome {
            Ok(result) => task.complete(result),
            Err(error) => task.fail(error),
        };
        if let Err(e) = recorded {
            tracing::error!(agent_id = %self.id(), task_id = %task.id, error = %e, "Could not record task outcome");
            return;
        }

        match task.status() {
            TaskStatus::Completed => {
                self.shared.completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(agent_id = %self.id(), task_id = %task.id, task_name = %task.name, "Task completed");
            }
            _ => {
                self.shared.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    agent_id = %self.id(),
                    task_id = %task.id,
                    task_name = %task.name,
                    error = %task.error().map(ToString::to_string).unwrap_or_default(),
                    "Task failed"
                );
            }
        }

        self.shared.ledger.write().await.insert(task.id.clone(), task);
    }

    /// Drop a task that another agent now owns
    pub(crate) async fn release_task(&self, task_id: &str, new_owner: &str) {
        self.shared.ledger.write().await.remove(task_id);
        self.shared.delegated.fetch_add(1, Ordering::Relaxed);
        tracing::info!(agent_id = %self.id(), task_id = %task_id, delegate = %new_owner, "Task delegated");
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Append a message to the inbox
    ///
    /// Called by the broker. Fails with `AgentStopped` once the agent is stopped.
    pub fn deliver(&self, message: Message) -> FrameworkResult<()> {
        if matches!(self.state(), AgentState::Stopped) {
            return Err(FrameworkError::AgentStopped(self.id().to_string()));
        }
        self.shared
            .inbox_tx
            .send(message)
            .map_err(|_| FrameworkError::ChannelClosed)
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn status(&self) -> AgentStatus {
        let (queue_depth, in_progress) = {
            let ledger = self.shared.ledger.read().await;
            let pending = ledger.values().filter(|t| t.status() == TaskStatus::Pending).count();
            let running = ledger.values().filter(|t| t.status() == TaskStatus::InProgress).count();
            (pending, running)
        };

        AgentStatus {
            agent_id: self.id().to_string(),
            name: self.name().to_string(),
            agent_type: self.agent_type().to_string(),
            state: self.state(),
            capabilities: self.capabilities().to_vec(),
            queue_depth,
            in_progress,
            completed_tasks: self.shared.completed.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed.load(Ordering::Relaxed),
            delegated_tasks: self.shared.delegated.load(Ordering::Relaxed),
            extended: self.shared.behavior.extended_status().await,
        }
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("agent_type", &self.shared.agent_type)
            .finish()
    }
}

//! Agent - Lifecycle state machine and the two processing loops
//!
//! An `Agent` owns one task loop and one message loop, each a tokio task:
//! - the task loop pops the highest-priority task and runs
//!   `AgentBehavior::process_task` on it, one task at a time
//! - the message loop drains the inbox and dispatches by topic
//!
//! Both loops park while the agent is not `Running` and exit when the
//! cancellation token fires. An in-flight task or handler always runs to
//! completion before a loop observes a pause or stop.
//!
//! ```ignore
//! let broker = MessageBroker::new();
//! let worker = Agent::new(AgentConfig::new("Worker-1"), Arc::new(WorkerAgent::new()), broker.clone()).await?;
//! worker.start().await?;
//! worker.add_task(Task::new("crunch").with_priority(5)).await?;
//! worker.stop().await?;
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{builtin_handlers, AgentBehavior, AgentConfig, HandlerTable, MessageHandler, TaskOutcome};
use crate::broker::MessageBroker;
use crate::core::{AgentState, FrameworkError, FrameworkResult, Message, Task, TaskError};

use super::channels::{create_inbox, InboxReceiver, StateReceiver};
use super::handle::{AgentHandle, AgentStatus};
use super::internals::AgentInternals;

#[derive(Default)]
struct Lifecycle {
    cancel: Option<CancellationToken>,
    loops: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    /// Cancel the loops of the current run and wait for them to exit
    async fn shutdown(&mut self, agent_id: &str) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        for task in self.loops.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(agent_id = %agent_id, error = %e, "Agent loop ended abnormally");
            }
        }
    }
}

/// A lifecycle-managed agent
pub struct Agent {
    handle: AgentHandle,
    broker: MessageBroker,
    handlers: Arc<RwLock<HandlerTable>>,
    inbox: Arc<Mutex<InboxReceiver>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Agent {
    /// Create an agent and register it with the broker
    ///
    /// Installs the built-in handlers, then the behavior's handlers, then
    /// subscribes to the behavior's and the config's topics. Fails with
    /// `DuplicateAgent` if the id is taken.
    pub async fn new<B>(config: AgentConfig, behavior: Arc<B>, broker: MessageBroker) -> FrameworkResult<Self>
    where
        B: AgentBehavior,
    {
        let id = config.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let agent_type = config
            .agent_type
            .unwrap_or_else(|| behavior.agent_type().to_string());

        let mut capabilities = behavior.capabilities();
        capabilities.extend(config.capabilities);
        capabilities.sort();
        capabilities.dedup();

        let (inbox_tx, inbox_rx) = create_inbox();
        let dyn_behavior: Arc<dyn AgentBehavior> = behavior.clone();
        let handle = AgentHandle::new(id, config.name, agent_type, capabilities, dyn_behavior, inbox_tx);

        broker.register(&handle).await?;

        let mut handlers = builtin_handlers();
        behavior.clone().install(&mut handlers);

        let mut topics = behavior.subscriptions();
        topics.extend(config.subscriptions);
        for topic in &topics {
            broker.subscribe(handle.id(), topic).await?;
        }

        tracing::info!(
            agent_id = %handle.id(),
            name = %handle.name(),
            agent_type = %handle.agent_type(),
            capabilities = ?handle.capabilities(),
            "Agent initialized"
        );

        Ok(Self {
            handle,
            broker,
            handlers: Arc::new(RwLock::new(handlers)),
            inbox: Arc::new(Mutex::new(inbox_rx)),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &AgentHandle {
        &self.handle
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    pub fn state(&self) -> AgentState {
        self.handle.state()
    }

    fn internals(&self) -> AgentInternals {
        AgentInternals::new(self.handle.clone(), self.broker.clone())
    }

    fn invalid(&self, action: &'static str, state: &AgentState) -> FrameworkError {
        FrameworkError::InvalidTransition {
            agent_id: self.id().to_string(),
            action,
            state: state.label().to_string(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start both loops; valid from `Idle` or `Stopped`
    pub async fn start(&self) -> FrameworkResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if !state.can_start() {
            return Err(self.invalid("start", &state));
        }

        let cancel = CancellationToken::new();
        self.handle.set_state(AgentState::Running);

        let internals = self.internals();
        lifecycle.loops = vec![
            tokio::spawn(run_task_loop(internals.clone(), cancel.clone())),
            tokio::spawn(run_message_loop(
                internals.clone(),
                self.handlers.clone(),
                self.inbox.clone(),
                cancel.clone(),
            )),
        ];
        lifecycle.cancel = Some(cancel);
        drop(lifecycle);

        tracing::info!(agent_id = %self.id(), name = %self.name(), "Agent started");

        if let Err(e) = self.handle.behavior().on_start(&internals).await {
            tracing::warn!(agent_id = %self.id(), error = %e, "Agent start hook failed");
        }
        Ok(())
    }

    /// Park both loops; valid only while `Running`
    pub async fn pause(&self) -> FrameworkResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if !state.is_running() {
            return Err(self.invalid("pause", &state));
        }
        self.handle.set_state(AgentState::Paused);
        tracing::info!(agent_id = %self.id(), "Agent paused");
        Ok(())
    }

    /// Wake both loops; valid only while `Paused`
    pub async fn resume(&self) -> FrameworkResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if state != AgentState::Paused {
            return Err(self.invalid("resume", &state));
        }
        self.handle.set_state(AgentState::Running);
        tracing::info!(agent_id = %self.id(), "Agent resumed");
        Ok(())
    }

    /// Cancel both loops and discard unread messages
    ///
    /// Waits for an in-flight task or handler to finish. Queued tasks stay
    /// `pending` and visible. Stopping a stopped agent is a no-op.
    pub async fn stop(&self) -> FrameworkResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.state() == AgentState::Stopped {
            tracing::debug!(agent_id = %self.id(), "Agent already stopped");
            return Ok(());
        }

        self.handle.set_state(AgentState::Stopped);
        lifecycle.shutdown(self.id()).await;

        let mut inbox = self.inbox.lock().await;
        let mut discarded = 0usize;
        while inbox.try_recv().is_ok() {
            discarded += 1;
        }
        drop(inbox);

        tracing::info!(
            agent_id = %self.id(),
            discarded_messages = discarded,
            pending_tasks = self.handle.queue_depth().await,
            "Agent stopped"
        );
        Ok(())
    }

    /// Leave the `Error` state for `Idle` so the agent can be started again
    pub async fn reset(&self) -> FrameworkResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if !matches!(state, AgentState::Error { .. }) {
            return Err(self.invalid("reset", &state));
        }
        lifecycle.shutdown(self.id()).await;
        self.handle.set_state(AgentState::Idle);
        tracing::info!(agent_id = %self.id(), "Agent reset");
        Ok(())
    }

    // =========================================================================
    // Work and messaging
    // =========================================================================

    /// Enqueue a task; fails with `AgentStopped` once stopped
    pub async fn add_task(&self, task: Task) -> FrameworkResult<String> {
        self.handle.add_task(task).await
    }

    /// Publish a message with this agent as sender
    pub async fn send_message(
        &self,
        topic: impl Into<String>,
        payload: Value,
        receiver_id: Option<&str>,
    ) -> FrameworkResult<usize> {
        self.internals().send_message(topic, payload, receiver_id).await
    }

    pub async fn subscribe_to_messages(&self, topic: &str) -> FrameworkResult<()> {
        self.broker.subscribe(self.id(), topic).await
    }

    pub async fn unsubscribe_from_messages(&self, topic: &str) -> bool {
        self.broker.unsubscribe(self.id(), topic).await
    }

    /// Register a handler for a topic, replacing any existing one
    pub async fn register_message_handler<H>(&self, topic: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        let topic = topic.into();
        tracing::debug!(agent_id = %self.id(), topic = %topic, "Message handler registered");
        self.handlers.write().await.insert(topic, handler);
    }

    pub async fn task(&self, task_id: &str) -> Option<Task> {
        self.handle.task(task_id).await
    }

    pub async fn pending_tasks(&self) -> Vec<Task> {
        self.handle.pending_tasks().await
    }

    pub async fn status(&self) -> AgentStatus {
        self.handle.status().await
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(cancel) = self.lifecycle.get_mut().cancel.take() {
            cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Loops
// ============================================================================

async fn run_task_loop(agent: AgentInternals, cancel: CancellationToken) {
    let handle = agent.handle().clone();
    let mut state_rx = handle.subscribe_state();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            running = wait_running(&mut state_rx, true) => {
                if !running {
                    break;
                }
            }
        }

        let task_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wait_running(&mut state_rx, false) => continue,
            task_id = handle.queue().pop() => task_id,
        };

        if !run_task(&agent, &task_id).await {
            break;
        }
    }

    tracing::debug!(agent_id = %handle.id(), "Task loop exited");
}

/// Process one task; returns false if the agent faulted
async fn run_task(agent: &AgentInternals, task_id: &str) -> bool {
    let handle = agent.handle();
    let Some(task) = handle.begin_task(task_id).await else {
        tracing::debug!(agent_id = %handle.id(), task_id = %task_id, "Skipping task no longer pending");
        return true;
    };

    tracing::info!(
        agent_id = %handle.id(),
        task_id = %task.id,
        task_name = %task.name,
        priority = task.priority,
        "Processing task"
    );

    let behavior = handle.behavior().clone();
    let outcome = AssertUnwindSafe(behavior.process_task(&task, agent))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(TaskOutcome::Completed(result))) => handle.finish_task(task, Ok(result)).await,
        Ok(Ok(TaskOutcome::Delegated { agent_id })) => handle.release_task(&task.id, &agent_id).await,
        Ok(Err(error)) => handle.finish_task(task, Err(error)).await,
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            let name = task.name.clone();
            handle.finish_task(task, Err(TaskError::internal(reason.clone()))).await;
            handle.fault(format!("task '{}' panicked: {}", name, reason));
            return false;
        }
    }
    true
}

async fn run_message_loop(
    agent: AgentInternals,
    handlers: Arc<RwLock<HandlerTable>>,
    inbox: Arc<Mutex<InboxReceiver>>,
    cancel: CancellationToken,
) {
    let mut inbox = inbox.lock().await;
    let mut state_rx = agent.handle().subscribe_state();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            running = wait_running(&mut state_rx, true) => {
                if !running {
                    break;
                }
            }
        }

        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wait_running(&mut state_rx, false) => continue,
            message = inbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if !dispatch(&agent, &handlers, message).await {
            break;
        }
    }

    tracing::debug!(agent_id = %agent.agent_id(), "Message loop exited");
}

/// Run the handler for one message; returns false if the agent faulted
async fn dispatch(agent: &AgentInternals, handlers: &RwLock<HandlerTable>, message: Message) -> bool {
    let Some(handler) = handlers.read().await.get(message.topic()) else {
        tracing::debug!(
            agent_id = %agent.agent_id(),
            topic = %message.topic(),
            sender_id = %message.sender_id(),
            "No handler for message type"
        );
        return true;
    };

    let topic = message.topic().to_string();
    let message_id = message.id().to_string();
    let outcome = AssertUnwindSafe(handler.handle(message, agent.clone()))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            tracing::trace!(agent_id = %agent.agent_id(), topic = %topic, message_id = %message_id, "Message handled");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(
                agent_id = %agent.agent_id(),
                topic = %topic,
                message_id = %message_id,
                error = %e,
                "Message handler failed"
            );
            true
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            agent
                .handle()
                .fault(format!("handler for '{}' panicked: {}", topic, reason));
            false
        }
    }
}

/// Wait until the agent is (or stops being) `Running`; false once the state channel closes
async fn wait_running(state_rx: &mut StateReceiver, running: bool) -> bool {
    state_rx
        .wait_for(|state| state.is_running() == running)
        .await
        .is_ok()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::WorkerAgent;
    use crate::core::topics::{PING, PONG, STATUS_REQUEST, STATUS_RESPONSE, TASK_ASSIGNMENT};
    use crate::core::{TaskErrorKind, TaskStatus};
    use serde_json::json;
    use std::time::Duration;

    type Seen = Arc<std::sync::Mutex<Vec<Message>>>;

    fn recorder() -> (Seen, impl MessageHandler) {
        let seen: Seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |message: Message, _agent: AgentInternals| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(message);
                Ok::<(), anyhow::Error>(())
            }
        };
        (seen, handler)
    }

    async fn worker(broker: &MessageBroker, id: &str, behavior: WorkerAgent) -> Agent {
        Agent::new(AgentConfig::new(id).with_id(id), Arc::new(behavior), broker.clone())
            .await
            .unwrap()
    }

    async fn wait_for_status(agent: &Agent, pred: impl Fn(&AgentStatus) -> bool) -> AgentStatus {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let status = agent.status().await;
                if pred(&status) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("status condition not reached")
    }

    async fn wait_for_messages(seen: &Seen, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("messages not received")
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;
        assert_eq!(agent.state(), AgentState::Idle);

        assert!(matches!(
            agent.pause().await,
            Err(FrameworkError::InvalidTransition { action: "pause", .. })
        ));

        agent.start().await.unwrap();
        assert!(matches!(
            agent.start().await,
            Err(FrameworkError::InvalidTransition { action: "start", .. })
        ));

        agent.pause().await.unwrap();
        assert_eq!(agent.state(), AgentState::Paused);
        assert!(agent.start().await.is_err());
        agent.resume().await.unwrap();
        assert!(agent.resume().await.is_err());

        agent.stop().await.unwrap();
        agent.stop().await.unwrap();
        assert_eq!(agent.state(), AgentState::Stopped);

        agent.start().await.unwrap();
        assert_eq!(agent.state(), AgentState::Running);
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_agent_rejects_tasks_but_keeps_pending() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;

        agent.add_task(Task::new("a")).await.unwrap();
        agent.add_task(Task::new("b").with_priority(2)).await.unwrap();
        agent.stop().await.unwrap();

        let err = agent.add_task(Task::new("c")).await.unwrap_err();
        assert!(matches!(err, FrameworkError::AgentStopped(_)));

        let pending = agent.pending_tasks().await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].name, "b");
        assert!(pending.iter().all(|t| t.status() == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_readding_known_task_id_is_rejected() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;
        agent.start().await.unwrap();

        let task = Task::new("first");
        let task_id = agent.add_task(task.clone()).await.unwrap();
        wait_for_status(&agent, |s| s.completed_tasks == 1).await;
        agent.pause().await.unwrap();

        let err = agent.add_task(task.clone()).await.unwrap_err();
        assert!(matches!(err, FrameworkError::DuplicateTask(ref id) if *id == task_id));

        let kept = agent.task(&task_id).await.unwrap();
        assert_eq!(kept.status(), TaskStatus::Completed);
        assert!(kept.result().is_some());
        assert_eq!(agent.handle().queue_depth().await, 0);
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_tasks_follow_enqueue_order() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;

        let early = Task::new("created first");
        let late = Task::new("created second");
        agent.add_task(late).await.unwrap();
        agent.add_task(early).await.unwrap();
        agent.add_task(Task::new("urgent").with_priority(3)).await.unwrap();

        let names: Vec<String> = agent.pending_tasks().await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["urgent", "created second", "created first"]);
    }

    async fn wait_for_task_status(agent: &Agent, task_id: &str, status: TaskStatus) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while agent.task(task_id).await.map(|t| t.status()) != Some(status) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("task status not reached")
    }

    #[tokio::test]
    async fn test_in_flight_task_finishes_across_pause_and_stop() {
        let broker = MessageBroker::new();
        let slow = WorkerAgent::new().with_work(|task: Task, _agent: AgentInternals| async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok::<_, TaskError>(json!(task.name))
        });
        let agent = worker(&broker, "w", slow).await;

        let a = agent.add_task(Task::new("a").with_priority(2)).await.unwrap();
        let b = agent.add_task(Task::new("b").with_priority(1)).await.unwrap();
        agent.start().await.unwrap();

        // Pausing while `a` runs lets it complete but holds `b`.
        wait_for_task_status(&agent, &a, TaskStatus::InProgress).await;
        agent.pause().await.unwrap();
        wait_for_task_status(&agent, &a, TaskStatus::Completed).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(agent.task(&b).await.unwrap().status(), TaskStatus::Pending);

        // Stopping while `b` runs waits for it.
        agent.resume().await.unwrap();
        wait_for_task_status(&agent, &b, TaskStatus::InProgress).await;
        agent.stop().await.unwrap();
        let finished = agent.task(&b).await.unwrap();
        assert_eq!(finished.status(), TaskStatus::Completed);
        assert_eq!(finished.result(), Some(&json!("b")));
        assert_eq!(agent.status().await.completed_tasks, 2);
    }

    #[tokio::test]
    async fn test_pause_holds_queued_tasks() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;
        agent.start().await.unwrap();
        agent.pause().await.unwrap();

        let task_id = agent.add_task(Task::new("held")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(agent.task(&task_id).await.unwrap().status(), TaskStatus::Pending);

        agent.resume().await.unwrap();
        wait_for_status(&agent, |s| s.completed_tasks == 1).await;
        assert_eq!(agent.task(&task_id).await.unwrap().status(), TaskStatus::Completed);
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_agent() {
        let broker = MessageBroker::new();
        let behavior = WorkerAgent::new().with_work(|task, _agent| async move {
            if task.name == "bad" {
                Err(TaskError::processing("boom"))
            } else {
                Ok(json!("ok"))
            }
        });
        let agent = worker(&broker, "w", behavior).await;
        agent.start().await.unwrap();

        let bad = agent.add_task(Task::new("bad").with_priority(9)).await.unwrap();
        let good = agent.add_task(Task::new("good")).await.unwrap();

        let status = wait_for_status(&agent, |s| s.completed_tasks + s.failed_tasks == 2).await;
        assert_eq!(status.failed_tasks, 1);
        assert_eq!(status.completed_tasks, 1);
        assert_eq!(status.state, AgentState::Running);

        let bad = agent.task(&bad).await.unwrap();
        assert_eq!(bad.error().unwrap().message, "boom");
        assert!(bad.result().is_none());
        assert_eq!(agent.task(&good).await.unwrap().result(), Some(&json!("ok")));
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_panic_enters_error_state_until_reset() {
        let broker = MessageBroker::new();
        let behavior = WorkerAgent::new().with_work(|task, _agent| async move {
            if task.name == "explode" {
                panic!("kaboom");
            }
            Ok::<_, TaskError>(json!("fine"))
        });
        let agent = worker(&broker, "w", behavior).await;
        agent.start().await.unwrap();

        let task_id = agent.add_task(Task::new("explode")).await.unwrap();
        let status = wait_for_status(&agent, |s| matches!(s.state, AgentState::Error { .. })).await;
        assert_eq!(status.failed_tasks, 1);

        let failed = agent.task(&task_id).await.unwrap();
        assert_eq!(failed.error().unwrap().kind, TaskErrorKind::Internal);
        assert!(agent.start().await.is_err());

        agent.reset().await.unwrap();
        assert_eq!(agent.state(), AgentState::Idle);
        agent.start().await.unwrap();
        agent.add_task(Task::new("after")).await.unwrap();
        wait_for_status(&agent, |s| s.completed_tasks == 1).await;
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_builtin_ping_and_status_request() {
        let broker = MessageBroker::new();
        let responder = worker(&broker, "responder", WorkerAgent::new()).await;
        let prober = worker(&broker, "prober", WorkerAgent::new()).await;

        let (pongs, pong_handler) = recorder();
        prober.register_message_handler(PONG, pong_handler).await;
        let (statuses, status_handler) = recorder();
        prober.register_message_handler(STATUS_RESPONSE, status_handler).await;

        responder.start().await.unwrap();
        prober.start().await.unwrap();

        prober.send_message(PING, json!(null), Some("responder")).await.unwrap();
        prober.send_message(STATUS_REQUEST, json!(null), Some("responder")).await.unwrap();

        wait_for_messages(&pongs, 1).await;
        wait_for_messages(&statuses, 1).await;

        let pong = pongs.lock().unwrap()[0].clone();
        assert_eq!(pong.sender_id(), "responder");
        assert!(pong.correlation_id().is_some());

        let status = statuses.lock().unwrap()[0].payload().clone();
        assert_eq!(status["agent_id"], "responder");
        assert_eq!(status["state"], "running");

        responder.stop().await.unwrap();
        prober.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_task_assignment_and_failing_handler() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;
        agent
            .register_message_handler("explode", |_message: Message, _agent: AgentInternals| async move {
                Err::<(), anyhow::Error>(anyhow::anyhow!("handler failed"))
            })
            .await;
        agent.start().await.unwrap();

        let outsider = Message::direct("ops", "w", "explode", json!(null));
        broker.publish(outsider).await.unwrap();
        let assign = Message::direct(
            "ops",
            "w",
            TASK_ASSIGNMENT,
            json!({ "name": "assigned", "priority": 3, "data": { "k": "v" } }),
        );
        broker.publish(assign).await.unwrap();

        let status = wait_for_status(&agent, |s| s.completed_tasks == 1).await;
        assert_eq!(status.state, AgentState::Running);
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_discards_unread_messages() {
        let broker = MessageBroker::new();
        let agent = worker(&broker, "w", WorkerAgent::new()).await;
        let (seen, handler) = recorder();
        agent.register_message_handler("note", handler).await;

        broker
            .publish(Message::direct("ops", "w", "note", json!(1)))
            .await
            .unwrap();
        agent.stop().await.unwrap();

        let err = broker
            .publish(Message::direct("ops", "w", "note", json!(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::AgentStopped(_)));

        agent.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen.lock().unwrap().is_empty());
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let broker = MessageBroker::new();
        let _first = worker(&broker, "same", WorkerAgent::new()).await;
        let second = Agent::new(
            AgentConfig::new("same").with_id("same"),
            Arc::new(WorkerAgent::new()),
            broker.clone(),
        )
        .await;
        assert!(matches!(second, Err(FrameworkError::DuplicateAgent(_))));
    }
}

//! Agent behaviors
//!
//! - `AgentBehavior` - what a concrete agent does with tasks and messages
//! - `WorkerAgent` - executes tasks itself
//! - `CoordinatorAgent` - delegates tasks to capable workers
//! - `AiAgent` - renders tasks through prompts and a provider
//! - `MessageHandler` / `HandlerTable` - topic dispatch

pub mod ai;
pub mod behavior;
pub mod builtin;
pub mod config;
pub mod coordinator;
pub mod handler;
pub mod worker;

pub use ai::{AiAgent, PROMPT_TEMPLATE_KEY};
pub use behavior::{AgentBehavior, TaskOutcome};
pub use builtin::{builtin_handlers, task_from_assignment};
pub use config::AgentConfig;
pub use coordinator::CoordinatorAgent;
pub use handler::{HandlerTable, MessageHandler};
pub use worker::{WorkerAgent, DEFAULT_WORKER_CAPABILITIES};

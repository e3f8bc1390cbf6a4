pub mod core;
pub mod broker;
pub mod runtime;

// Concrete agent behaviors
pub mod agent;

// Prompt rendering and conversation contexts
pub mod prompt;

// Provider integration
pub mod llm;

pub mod logging;

pub use agent::{AgentBehavior, AgentConfig, AiAgent, CoordinatorAgent, TaskOutcome, WorkerAgent};
pub use broker::MessageBroker;
pub use core::{AgentState, FrameworkError, FrameworkResult, Message, Task, TaskError, TaskStatus};
pub use runtime::{Agent, AgentHandle, AgentInternals, AgentRuntime, AgentStatus};

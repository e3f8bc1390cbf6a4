//! Agent runtime
//!
//! This module provides the infrastructure for running agents:
//! - `Agent` - lifecycle state machine owning a task loop and a message loop
//! - `AgentHandle` - shared view used by the broker, the runtime and other agents
//! - `AgentInternals` - what behaviors and handlers see of their own agent
//! - `AgentRuntime` - owns the broker and a set of agents; the caller-facing API
//! - `TaskQueue` and channel types
//!
//! Each agent's loops run as separate tokio tasks and communicate only through
//! the agent's own queue and inbox.

pub mod agent;
pub mod channels;
pub mod handle;
pub mod internals;
pub mod queue;
pub mod runtime;

pub use agent::Agent;
pub use channels::{InboxReceiver, InboxSender, StateReceiver, StateSender};
pub use handle::{AgentHandle, AgentStatus, WeakAgentHandle};
pub use internals::AgentInternals;
pub use queue::TaskQueue;
pub use runtime::{AgentRuntime, TaskReport};

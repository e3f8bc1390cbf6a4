//! Core types for the agent runtime
//!
//! - `Message` - immutable inter-agent message
//! - `Task` - unit of work with priority and terminal outcome
//! - `AgentState` - lifecycle state of an agent
//! - `FrameworkError` - error taxonomy
//! - `topics` - well-known message topics

pub mod error;
pub mod message;
pub mod state;
pub mod task;
pub mod topics;

pub use error::{FrameworkError, FrameworkResult};
pub use message::Message;
pub use state::AgentState;
pub use task::{Task, TaskError, TaskErrorKind, TaskStatus, REQUIRED_CAPABILITIES_KEY};

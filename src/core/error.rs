//! Framework error types

use thiserror::Error;

/// Errors that can occur in the agent runtime
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// An agent with this id is already registered with the broker
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// A direct message named a receiver the broker does not know
    #[error("Unknown receiver: {0}")]
    UnknownReceiver(String),

    /// An operation referenced an agent the broker or runtime does not know
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// A lifecycle operation was invoked from a state that does not allow it
    #[error("Invalid transition: cannot {action} agent '{agent_id}' while {state}")]
    InvalidTransition {
        /// Agent the operation targeted
        agent_id: String,
        /// Operation that was attempted (start, pause, ...)
        action: &'static str,
        /// State the agent was in
        state: String,
    },

    /// The agent is stopped and no longer accepts work
    #[error("Agent stopped: {0}")]
    AgentStopped(String),

    /// The agent already holds a task with this id
    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    /// A template placeholder had no supplied value
    #[error("Missing template variable '{variable}' in template '{template}'")]
    MissingVariable {
        /// Template being rendered
        template: String,
        /// Placeholder that had no value
        variable: String,
    },

    /// No registered worker covers the required capabilities
    #[error("No eligible agent for capabilities: {0:?}")]
    NoEligibleAgent(Vec<String>),

    /// A task status change outside pending -> in_progress -> completed|failed
    #[error("Invalid task transition for {task_id}: {from} -> {to}")]
    InvalidTaskTransition {
        /// Task being updated
        task_id: String,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    ChannelClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl FrameworkError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        FrameworkError::Other(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        FrameworkError::InvalidConfig(msg.into())
    }
}

/// Result type alias for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameworkError::DuplicateAgent("worker-1".into());
        assert_eq!(err.to_string(), "Agent already registered: worker-1");

        let err = FrameworkError::InvalidTransition {
            agent_id: "a".into(),
            action: "pause",
            state: "Idle".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot pause agent 'a' while Idle"
        );

        let err = FrameworkError::MissingVariable {
            template: "greeting".into(),
            variable: "name".into(),
        };
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: FrameworkError = json_err.into();
        assert!(matches!(err, FrameworkError::Serialization(_)));
    }
}

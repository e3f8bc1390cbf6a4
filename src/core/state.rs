//! Agent lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of an agent
///
/// `Idle -> Running <-> Paused`, any non-stopped state `-> Stopped`,
/// `Stopped -> Running` on restart. `Error` is entered from `Running` on an
/// unrecovered internal fault and only leaves through `reset()` back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    /// Constructed, loops not started
    Idle,

    /// Both loops are draining their queues
    Running,

    /// Loops are parked; queued work is retained
    Paused,

    /// Loops cancelled; pending tasks stay visible
    Stopped,

    /// An internal fault stopped the loops
    Error {
        /// Description of the fault
        message: String,
    },
}

impl AgentState {
    /// Whether `start()` is allowed from this state
    pub fn can_start(&self) -> bool {
        matches!(self, AgentState::Idle | AgentState::Stopped)
    }

    /// Whether the loops should be pulling work
    pub fn is_running(&self) -> bool {
        matches!(self, AgentState::Running)
    }

    /// Whether the agent still accepts new tasks
    pub fn accepts_tasks(&self) -> bool {
        !matches!(self, AgentState::Stopped)
    }

    /// Stopped or errored
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Stopped | AgentState::Error { .. })
    }

    /// Create an error state
    pub fn error(msg: impl Into<String>) -> Self {
        AgentState::Error {
            message: msg.into(),
        }
    }

    /// Short lowercase label used in status records
    pub fn label(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Running => "running",
            AgentState::Paused => "paused",
            AgentState::Stopped => "stopped",
            AgentState::Error { .. } => "error",
        }
    }
}

impl Default for AgentState {
    fn default() -> Self {
        AgentState::Idle
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "Idle"),
            AgentState::Running => write!(f, "Running"),
            AgentState::Paused => write!(f, "Paused"),
            AgentState::Stopped => write!(f, "Stopped"),
            AgentState::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_checks() {
        assert!(AgentState::Idle.can_start());
        assert!(AgentState::Stopped.can_start());
        assert!(!AgentState::Running.can_start());
        assert!(!AgentState::Paused.can_start());
        assert!(!AgentState::error("boom").can_start());

        assert!(AgentState::Running.is_running());
        assert!(!AgentState::Paused.is_running());

        assert!(AgentState::Paused.accepts_tasks());
        assert!(AgentState::error("boom").accepts_tasks());
        assert!(!AgentState::Stopped.accepts_tasks());

        assert!(AgentState::error("boom").is_terminal());
        assert!(!AgentState::Idle.is_terminal());
    }

    #[test]
    fn test_state_display_and_serde() {
        assert_eq!(AgentState::Paused.to_string(), "Paused");
        assert_eq!(AgentState::error("oops").to_string(), "Error: oops");

        let json = serde_json::to_value(AgentState::Running).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(AgentState::error("x").label(), "error");
    }
}

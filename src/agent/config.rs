//! Agent Configuration
//!
//! Identity and wiring options for an [`Agent`](crate::runtime::Agent).

/// Configuration for an agent
///
/// Use the builder pattern to configure the agent:
///
/// ```ignore
/// let config = AgentConfig::new("Worker-1")
///     .with_capabilities(["data_processing", "computation"])
///     .subscribe_to("work_request");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Display name
    pub name: String,

    /// Fixed identifier; a UUID is generated when absent
    pub id: Option<String>,

    /// Type tag; defaults to the behavior's type
    pub agent_type: Option<String>,

    /// Capabilities on top of those the behavior declares
    pub capabilities: Vec<String>,

    /// Topics on top of those the behavior subscribes to
    pub subscriptions: Vec<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Use a fixed identifier instead of a generated one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = Some(agent_type.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Subscribe to a topic at construction
    pub fn subscribe_to(mut self, topic: impl Into<String>) -> Self {
        self.subscriptions.push(topic.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = AgentConfig::new("Analyst")
            .with_id("analyst-1")
            .with_type("ai")
            .with_capability("analysis")
            .with_capabilities(["research", "writing"])
            .subscribe_to("ai_request");

        assert_eq!(config.name, "Analyst");
        assert_eq!(config.id.as_deref(), Some("analyst-1"));
        assert_eq!(config.agent_type.as_deref(), Some("ai"));
        assert_eq!(config.capabilities, vec!["analysis", "research", "writing"]);
        assert_eq!(config.subscriptions, vec!["ai_request"]);
    }
}

//! Well-known message topics

/// Liveness probe; answered with [`PONG`]
pub const PING: &str = "ping";
pub const PONG: &str = "pong";

/// Status query; answered with [`STATUS_RESPONSE`] carrying the agent status
pub const STATUS_REQUEST: &str = "status_request";
pub const STATUS_RESPONSE: &str = "status_response";

/// `{name, description, priority, data}` turned into a task on the receiver
pub const TASK_ASSIGNMENT: &str = "task_assignment";

/// Work offered to workers; each becomes a priority-1 task
pub const WORK_REQUEST: &str = "work_request";

/// Worker announcement `{type, capabilities}` consumed by coordinators
pub const AGENT_REGISTRATION: &str = "agent_registration";

/// Prompt completion request for AI agents; answered with [`AI_RESPONSE`]
pub const AI_REQUEST: &str = "ai_request";
pub const AI_RESPONSE: &str = "ai_response";

/// System prompt or LLM option changes for AI agents
pub const PROMPT_UPDATE: &str = "prompt_update";

/// Conversation turns shared between AI agents
pub const CONTEXT_SHARE: &str = "context_share";

//! Handlers every agent starts with
//!
//! - `ping` -> `pong` reply
//! - `status_request` -> `status_response` reply with the agent status
//! - `task_assignment` -> task enqueued on the receiver
//!
//! Registering a handler for the same topic replaces the built-in.

use anyhow::{bail, Context};
use serde_json::{json, Map, Value};

use crate::core::topics::{PING, PONG, STATUS_REQUEST, STATUS_RESPONSE, TASK_ASSIGNMENT};
use crate::core::{Message, Task};
use crate::runtime::AgentInternals;

use super::handler::HandlerTable;

/// Table pre-filled with the built-in handlers
pub fn builtin_handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.insert(PING, handle_ping);
    table.insert(STATUS_REQUEST, handle_status_request);
    table.insert(TASK_ASSIGNMENT, handle_task_assignment);
    table
}

async fn handle_ping(message: Message, agent: AgentInternals) -> anyhow::Result<()> {
    agent.reply(&message, PONG, json!("pong")).await?;
    Ok(())
}

async fn handle_status_request(message: Message, agent: AgentInternals) -> anyhow::Result<()> {
    let status = serde_json::to_value(agent.status().await)?;
    agent.reply(&message, STATUS_RESPONSE, status).await?;
    Ok(())
}

async fn handle_task_assignment(message: Message, agent: AgentInternals) -> anyhow::Result<()> {
    let task = task_from_assignment(message.payload())?;
    let name = task.name.clone();
    agent.add_task(task).await.context("enqueue assigned task")?;
    tracing::info!(agent_id = %agent.agent_id(), sender_id = %message.sender_id(), task_name = %name, "Task assigned");
    Ok(())
}

/// Build a task from `{name, description, priority, data}`
pub fn task_from_assignment(payload: &Value) -> anyhow::Result<Task> {
    let Some(fields) = payload.as_object() else {
        bail!("task assignment payload must be an object");
    };

    let name = fields.get("name").and_then(Value::as_str).unwrap_or("assigned task");
    let description = fields.get("description").and_then(Value::as_str).unwrap_or_default();
    let priority = fields
        .get("priority")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    let data = match fields.get("data") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(other) => bail!("task assignment data must be an object, got {}", other),
    };

    Ok(Task::new(name)
        .with_description(description)
        .with_priority(priority)
        .with_payload(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_topics() {
        let table = builtin_handlers();
        assert_eq!(table.topics(), vec!["ping", "status_request", "task_assignment"]);
    }

    #[test]
    fn test_task_from_assignment() {
        let payload = json!({
            "name": "crunch",
            "description": "crunch numbers",
            "priority": 4,
            "data": { "rows": 10 }
        });
        let task = task_from_assignment(&payload).unwrap();
        assert_eq!(task.name, "crunch");
        assert_eq!(task.description, "crunch numbers");
        assert_eq!(task.priority, 4);
        assert_eq!(task.payload.get("rows"), Some(&json!(10)));
    }

    #[test]
    fn test_task_from_assignment_rejects_bad_payloads() {
        assert!(task_from_assignment(&json!("not an object")).is_err());
        assert!(task_from_assignment(&json!({ "data": [1, 2] })).is_err());

        let task = task_from_assignment(&json!({})).unwrap();
        assert_eq!(task.name, "assigned task");
        assert_eq!(task.priority, 0);
    }
}

//! Tasks and their terminal outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::error::{FrameworkError, FrameworkResult};

/// Payload key listing the capabilities a task needs
pub const REQUIRED_CAPABILITIES_KEY: &str = "required_capabilities";

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a task failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The task body reported a failure
    Processing,
    /// A coordinator found no worker covering the required capabilities
    NoEligibleAgent,
    /// A prompt template was missing a variable
    MissingVariable,
    /// Provider retries were exhausted on transient errors
    ProviderTransient,
    /// Provider rejected the request outright
    ProviderFatal,
    /// The task body panicked
    Internal,
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskErrorKind::Processing => "processing",
            TaskErrorKind::NoEligibleAgent => "no_eligible_agent",
            TaskErrorKind::MissingVariable => "missing_variable",
            TaskErrorKind::ProviderTransient => "provider_transient",
            TaskErrorKind::ProviderFatal => "provider_fatal",
            TaskErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Failure descriptor recorded on a failed task
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A failure reported by a task body
    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::Processing, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::Internal, message)
    }
}

impl From<FrameworkError> for TaskError {
    fn from(err: FrameworkError) -> Self {
        let kind = match &err {
            FrameworkError::NoEligibleAgent(_) => TaskErrorKind::NoEligibleAgent,
            FrameworkError::MissingVariable { .. } => TaskErrorKind::MissingVariable,
            _ => TaskErrorKind::Processing,
        };
        TaskError::new(kind, err.to_string())
    }
}

/// A unit of work with a priority and a terminal outcome
///
/// `status`, `result` and `error` only change through [`Task::start`],
/// [`Task::complete`] and [`Task::fail`], which enforce
/// `pending -> in_progress -> completed | failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Higher runs first
    pub priority: i32,
    pub payload: Map<String, Value>,
    status: TaskStatus,
    result: Option<Value>,
    error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with priority 0 and an empty payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            priority: 0,
            payload: Map::new(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Set a single payload entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Declare the capabilities a worker needs to run this task
    pub fn requiring<I, S>(self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let caps: Vec<Value> = capabilities
            .into_iter()
            .map(|c| Value::String(c.into()))
            .collect();
        self.with_field(REQUIRED_CAPABILITIES_KEY, Value::Array(caps))
    }

    /// Capabilities listed under `required_capabilities` (non-strings are skipped)
    pub fn required_capabilities(&self) -> Vec<String> {
        self.payload
            .get(REQUIRED_CAPABILITIES_KEY)
            .and_then(|v| v.as_array())
            .map(|caps| {
                caps.iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Present iff completed
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Present iff failed
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// `pending -> in_progress`
    pub fn start(&mut self) -> FrameworkResult<()> {
        self.transition(TaskStatus::Pending, TaskStatus::InProgress)
    }

    /// `in_progress -> completed`
    pub fn complete(&mut self, result: Value) -> FrameworkResult<()> {
        self.transition(TaskStatus::InProgress, TaskStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `in_progress -> failed`
    pub fn fail(&mut self, error: TaskError) -> FrameworkResult<()> {
        self.transition(TaskStatus::InProgress, TaskStatus::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// A fresh pending copy with the same identity, used when a task changes owner
    pub fn reassigned(&self) -> Task {
        Task {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            priority: self.priority,
            payload: self.payload.clone(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: self.created_at,
            completed_at: None,
        }
    }

    fn transition(&mut self, from: TaskStatus, to: TaskStatus) -> FrameworkResult<()> {
        if self.status != from {
            return Err(FrameworkError::InvalidTaskTransition {
                task_id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_happy_path_transitions() {
        let mut task = Task::new("compute").with_priority(3);
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.result().is_none());

        task.start().unwrap();
        assert_eq!(task.status(), TaskStatus::InProgress);

        task.complete(json!("done")).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result(), Some(&json!("done")));
        assert!(task.error().is_none());
        assert!(task.completed_at().is_some());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut task = Task::new("t");
        assert!(matches!(
            task.complete(json!(1)),
            Err(FrameworkError::InvalidTaskTransition { .. })
        ));

        task.start().unwrap();
        task.fail(TaskError::processing("nope")).unwrap();
        assert!(task.start().is_err());
        assert!(task.complete(json!(1)).is_err());
        assert_eq!(task.error().unwrap().kind, TaskErrorKind::Processing);
        assert!(task.result().is_none());
    }

    #[test]
    fn test_required_capabilities() {
        let task = Task::new("t").requiring(["data_processing", "computation"]);
        assert_eq!(
            task.required_capabilities(),
            vec!["data_processing".to_string(), "computation".to_string()]
        );
        assert!(Task::new("plain").required_capabilities().is_empty());
    }

    #[test]
    fn test_reassigned_keeps_identity() {
        let mut task = Task::new("t").with_priority(7).with_field("k", "v");
        task.start().unwrap();

        let copy = task.reassigned();
        assert_eq!(copy.id, task.id);
        assert_eq!(copy.priority, 7);
        assert_eq!(copy.status(), TaskStatus::Pending);
        assert_eq!(copy.payload["k"], "v");
    }

    #[test]
    fn test_task_error_from_framework_error() {
        let err: TaskError = FrameworkError::NoEligibleAgent(vec!["x".into()]).into();
        assert_eq!(err.kind, TaskErrorKind::NoEligibleAgent);
        assert_eq!(err.to_string(), format!("no_eligible_agent: {}", err.message));
    }
}

//! AiAgent - prompt-driven task processing over a provider
//!
//! Each task is rendered through a prompt template into a fresh conversation
//! context and sent to the provider through a [`ProviderClient`], which owns
//! timeout, retry and counters. Provider failures fail the task, never the
//! agent.
//!
//! Message handlers:
//! - `ai_request` with `{"type": "prompt_completion", "prompt", "context_id"}`
//!   answers `ai_response` with `{"result", "context_id"}`
//! - `prompt_update` with `{"system_prompt"?, "llm_config"?}`
//! - `context_share` with `{"context_id", "messages": [{"role", "content"}]}`

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::core::topics::{AI_REQUEST, AI_RESPONSE, CONTEXT_SHARE, PROMPT_UPDATE};
use crate::core::{FrameworkResult, Message, Task, TaskError};
use crate::llm::{ProviderClient, ProviderError};
use crate::prompt::{ConversationContext, PromptLibrary, Role, DEFAULT_TASK_TEMPLATE};
use crate::runtime::AgentInternals;

use super::behavior::{AgentBehavior, TaskOutcome};
use super::handler::HandlerTable;

/// Payload key naming the template a task should be rendered with
pub const PROMPT_TEMPLATE_KEY: &str = "prompt_template";

const AI_CAPABILITIES: [&str; 4] = [
    "llm_processing",
    "prompt_handling",
    "conversation_management",
    "context_awareness",
];

const ANALYST_PROMPT: &str = "You are an expert data analyst AI agent. Your role is to:
1. Analyze complex datasets and identify patterns
2. Generate insights and recommendations
3. Create clear, actionable reports
4. Collaborate with other agents on analytical tasks

Always provide evidence-based analysis and clearly explain your methodology.";

const TREND_ANALYSIS: &str = "Perform trend analysis on the following data:

Data: {data}
Time Period: {time_period}
Metrics: {metrics}

Identify key trends, patterns, and anomalies. Provide insights and predictions.";

const RESEARCH_PROMPT: &str = "You are a research specialist AI agent. Your role is to:
1. Conduct thorough research on given topics
2. Synthesize information from multiple sources
3. Generate comprehensive research reports
4. Fact-check and verify information

Always cite sources and provide well-structured, evidence-based research.";

const LITERATURE_REVIEW: &str = "Conduct a literature review on the following topic:

Topic: {topic}
Scope: {scope}
Key Questions: {questions}

Provide a comprehensive review with key findings, gaps, and recommendations.";

/// Behavior of a provider-backed agent
pub struct AiAgent {
    client: ProviderClient,
    capabilities: Vec<String>,
    system_prompt: RwLock<Option<String>>,
    library: RwLock<PromptLibrary>,
    contexts: RwLock<HashMap<String, ConversationContext>>,
}

impl AiAgent {
    pub fn new(client: ProviderClient) -> Self {
        Self {
            client,
            capabilities: AI_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            system_prompt: RwLock::new(None),
            library: RwLock::new(PromptLibrary::with_defaults()),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Data-analysis preset with a `trend_analysis` task prompt
    pub fn analyst(client: ProviderClient) -> Self {
        let mut library = PromptLibrary::with_defaults();
        library.add_task_prompt("trend_analysis", TREND_ANALYSIS);
        Self::new(client)
            .with_system_prompt(ANALYST_PROMPT)
            .with_library(library)
            .with_capability("data_analysis")
    }

    /// Research preset with a `literature_review` task prompt
    pub fn researcher(client: ProviderClient) -> Self {
        let mut library = PromptLibrary::with_defaults();
        library.add_task_prompt("literature_review", LITERATURE_REVIEW);
        Self::new(client)
            .with_system_prompt(RESEARCH_PROMPT)
            .with_library(library)
            .with_capability("research")
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        *self.system_prompt.get_mut() = Some(prompt.into());
        self
    }

    pub fn with_library(mut self, library: PromptLibrary) -> Self {
        *self.library.get_mut() = library;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    pub async fn system_prompt(&self) -> Option<String> {
        self.system_prompt.read().await.clone()
    }

    pub async fn set_system_prompt(&self, prompt: impl Into<String>) {
        *self.system_prompt.write().await = Some(prompt.into());
        tracing::info!("System prompt updated");
    }

    pub async fn add_template(&self, name: impl Into<String>, template: impl Into<String>) {
        self.library.write().await.add_template(name, template);
    }

    pub async fn add_task_prompt(&self, task_type: impl Into<String>, template: impl Into<String>) {
        self.library.write().await.add_task_prompt(task_type, template);
    }

    /// Copy of a conversation context
    pub async fn context(&self, context_id: &str) -> Option<ConversationContext> {
        self.contexts.read().await.get(context_id).cloned()
    }

    pub async fn context_count(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Drop a conversation context, returning whether it existed
    pub async fn forget_context(&self, context_id: &str) -> bool {
        self.contexts.write().await.remove(context_id).is_some()
    }

    /// Append a turn, creating the context if needed
    async fn push_turn(&self, context_id: &str, role: Role, content: &str) {
        let max_turns = self.client.settings().snapshot().await.context_max_turns;
        let mut contexts = self.contexts.write().await;
        contexts
            .entry(context_id.to_string())
            .or_insert_with(|| ConversationContext::new(context_id, max_turns))
            .add_message(role, content);
    }

    /// Add a user turn to a context, ask the provider, and record the answer
    pub async fn complete(&self, context_id: &str, prompt: &str) -> Result<String, ProviderError> {
        self.push_turn(context_id, Role::User, prompt).await;

        let turns = self
            .contexts
            .read()
            .await
            .get(context_id)
            .map(ConversationContext::render)
            .unwrap_or_default();
        let system_prompt = self.system_prompt().await.unwrap_or_default();

        let answer = self.client.generate(&system_prompt, &turns).await?;
        self.push_turn(context_id, Role::Assistant, &answer).await;
        Ok(answer)
    }

    /// Body of a `context_share` message for a context, if it exists
    pub async fn context_share_payload(&self, context_id: &str) -> Option<Value> {
        let contexts = self.contexts.read().await;
        let context = contexts.get(context_id)?;
        let messages: Vec<Value> = context
            .turns()
            .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content }))
            .collect();
        Some(json!({ "context_id": context_id, "messages": messages }))
    }

    /// Send a context to another agent
    pub async fn share_context(
        &self,
        agent: &AgentInternals,
        context_id: &str,
        target_agent_id: &str,
    ) -> FrameworkResult<usize> {
        let Some(payload) = self.context_share_payload(context_id).await else {
            return Ok(0);
        };
        let reached = agent.send_to(target_agent_id, CONTEXT_SHARE, payload).await?;
        tracing::info!(context_id = %context_id, target = %target_agent_id, "Context shared");
        Ok(reached)
    }

    // =========================================================================
    // Message handlers
    // =========================================================================

    async fn on_ai_request(&self, message: Message, agent: AgentInternals) -> anyhow::Result<()> {
        let payload = message.payload();
        let request_type = payload.get("type").and_then(Value::as_str).unwrap_or("general");
        if request_type != "prompt_completion" {
            tracing::debug!(request_type = %request_type, "Ignoring ai_request type");
            return Ok(());
        }

        let prompt = payload.get("prompt").and_then(Value::as_str).unwrap_or_default();
        let context_id = payload
            .get("context_id")
            .and_then(Value::as_str)
            .unwrap_or("default");

        match self.complete(context_id, prompt).await {
            Ok(result) => {
                agent
                    .reply(&message, AI_RESPONSE, json!({ "result": result, "context_id": context_id }))
                    .await?;
                Ok(())
            }
            Err(e) => {
                agent
                    .reply(&message, AI_RESPONSE, json!({ "error": e.to_string(), "context_id": context_id }))
                    .await?;
                Err(anyhow!(e))
            }
        }
    }

    async fn on_prompt_update(&self, message: Message) -> anyhow::Result<()> {
        let payload = message.payload();
        if let Some(prompt) = payload.get("system_prompt") {
            let Some(prompt) = prompt.as_str() else {
                bail!("system_prompt must be a string");
            };
            self.set_system_prompt(prompt).await;
        }
        if let Some(options) = payload.get("llm_config") {
            let Some(options) = options.as_object() else {
                bail!("llm_config must be an object");
            };
            self.client.settings().apply_options(options).await?;
            tracing::info!(options = ?options.keys().collect::<Vec<_>>(), "LLM config updated");
        }
        Ok(())
    }

    async fn on_context_share(&self, message: Message) -> anyhow::Result<()> {
        let payload = message.payload();
        let Some(context_id) = payload.get("context_id").and_then(Value::as_str) else {
            bail!("context_share requires a context_id");
        };
        let shared = payload
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut merged = 0;
        for entry in &shared {
            let role = entry.get("role").and_then(Value::as_str).and_then(Role::parse);
            let content = entry.get("content").and_then(Value::as_str);
            match (role, content) {
                (Some(role), Some(content)) => {
                    self.push_turn(context_id, role, content).await;
                    merged += 1;
                }
                _ => tracing::warn!(context_id = %context_id, "Skipping malformed shared turn"),
            }
        }

        tracing::info!(context_id = %context_id, sender_id = %message.sender_id(), merged, "Received shared context");
        Ok(())
    }

    fn template_vars(task: &Task) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = task
            .payload
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect();
        vars.insert("task_name".into(), task.name.clone());
        vars.insert("task_description".into(), task.description.clone());
        vars.insert(
            "task_data".into(),
            serde_json::to_string_pretty(&task.payload).unwrap_or_default(),
        );
        vars.insert("priority".into(), task.priority.to_string());
        vars
    }
}

#[async_trait]
impl AgentBehavior for AiAgent {
    fn agent_type(&self) -> &str {
        "ai_agent"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn subscriptions(&self) -> Vec<String> {
        vec![
            AI_REQUEST.to_string(),
            PROMPT_UPDATE.to_string(),
            CONTEXT_SHARE.to_string(),
        ]
    }

    fn install(self: Arc<Self>, handlers: &mut HandlerTable) {
        let ai = self.clone();
        handlers.insert(AI_REQUEST, move |message: Message, agent: AgentInternals| {
            let ai = ai.clone();
            async move { ai.on_ai_request(message, agent).await }
        });

        let ai = self.clone();
        handlers.insert(PROMPT_UPDATE, move |message: Message, _agent: AgentInternals| {
            let ai = ai.clone();
            async move { ai.on_prompt_update(message).await }
        });

        let ai = self;
        handlers.insert(CONTEXT_SHARE, move |message: Message, _agent: AgentInternals| {
            let ai = ai.clone();
            async move { ai.on_context_share(message).await }
        });
    }

    async fn process_task(&self, task: &Task, _agent: &AgentInternals) -> Result<TaskOutcome, TaskError> {
        let template_name = task
            .payload
            .get(PROMPT_TEMPLATE_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TASK_TEMPLATE);

        let template = self.library.read().await.resolve(template_name).cloned();
        let Some(template) = template else {
            tracing::warn!(task_id = %task.id, template = %template_name, "No prompt template found");
            return Ok(TaskOutcome::completed(format!(
                "Processed task {} - no specific prompt template found",
                task.name
            )));
        };

        let prompt = template.render(&Self::template_vars(task))?;
        // Task contexts live only for the duration of the call.
        let context_id = format!("task_{}", task.id);
        let answer = self.complete(&context_id, &prompt).await;
        self.forget_context(&context_id).await;
        Ok(TaskOutcome::Completed(Value::String(answer?)))
    }

    async fn extended_status(&self) -> Option<Value> {
        let library = self.library.read().await;
        Some(json!({
            "contexts": self.contexts.read().await.len(),
            "prompt_templates": library.template_count(),
            "task_prompts": library.task_prompt_count(),
            "system_prompt": self.system_prompt.read().await.is_some(),
            "model": self.client.settings().current_model().await,
            "provider": self.client.stats().await,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::core::{TaskErrorKind, TaskStatus};
    use crate::llm::{EchoProvider, LlmConfig};
    use crate::runtime::AgentRuntime;
    use std::time::Duration;

    fn echo_agent() -> AiAgent {
        let client = ProviderClient::new(Arc::new(EchoProvider::new()), LlmConfig::new("echo-model"));
        AiAgent::new(client)
    }

    #[tokio::test]
    async fn test_complete_records_both_turns() {
        let ai = echo_agent().with_system_prompt("be brief");
        let answer = ai.complete("conv", "hello").await.unwrap();
        assert_eq!(answer, "[echo-model] hello");

        let context = ai.context("conv").await.unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context.render()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_template_vars_include_payload_and_task_fields() {
        let task = Task::new("trend")
            .with_priority(2)
            .with_field("data", "sales")
            .with_field("metrics", 3);
        let vars = AiAgent::template_vars(&task);
        assert_eq!(vars["data"], "sales");
        assert_eq!(vars["metrics"], "3");
        assert_eq!(vars["task_name"], "trend");
        assert_eq!(vars["priority"], "2");
    }

    #[tokio::test]
    async fn test_analyst_preset() {
        let client = ProviderClient::new(Arc::new(EchoProvider::new()), LlmConfig::default());
        let ai = AiAgent::analyst(client);
        assert!(ai.system_prompt().await.unwrap().contains("data analyst"));
        assert!(ai.capabilities().contains(&"data_analysis".to_string()));
        assert!(ai.library.read().await.resolve("trend_analysis").is_some());
    }

    #[tokio::test]
    async fn test_prompt_update_is_validated() {
        let ai = echo_agent();
        let update = Message::broadcast(
            "ops",
            PROMPT_UPDATE,
            json!({ "system_prompt": "new role", "llm_config": { "model": "gpt-4o", "temperature": 0.1 } }),
        );
        ai.on_prompt_update(update).await.unwrap();
        assert_eq!(ai.system_prompt().await.as_deref(), Some("new role"));
        assert_eq!(ai.client().settings().current_model().await, "gpt-4o");

        let bad = Message::broadcast("ops", PROMPT_UPDATE, json!({ "llm_config": { "max_tokens": "many" } }));
        assert!(ai.on_prompt_update(bad).await.is_err());
        assert_eq!(ai.client().settings().current_model().await, "gpt-4o");
    }

    #[tokio::test]
    async fn test_context_share_round_trip() {
        let source = echo_agent();
        source.complete("shared", "question").await.unwrap();
        let payload = source.context_share_payload("shared").await.unwrap();
        assert!(source.context_share_payload("missing").await.is_none());

        let target = echo_agent();
        target
            .on_context_share(Message::direct("src", "dst", CONTEXT_SHARE, payload))
            .await
            .unwrap();

        let merged = target.context("shared").await.unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.render()[0].content, "question");
    }

    #[tokio::test]
    async fn test_task_contexts_are_released() {
        let ai = Arc::new(echo_agent());
        let runtime = AgentRuntime::new();
        let agent = runtime
            .spawn(AgentConfig::new("Analyst").with_id("analyst"), ai.clone())
            .await
            .unwrap();
        ai.complete("chat", "kept").await.unwrap();
        agent.start().await.unwrap();

        let mut ids = Vec::new();
        for i in 0..30 {
            ids.push(agent.add_task(Task::new(format!("t{}", i))).await.unwrap());
        }
        for id in &ids {
            let finished = tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    if let Some(task) = runtime.take_task(id).await {
                        return task;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();
            assert_eq!(finished.status(), TaskStatus::Completed);
        }

        assert_eq!(ai.context_count().await, 1);
        assert!(ai.context("chat").await.is_some());
        runtime.stop_all().await;
    }

    #[test]
    fn test_missing_variable_maps_to_task_error() {
        let template = crate::prompt::PromptTemplate::new("t", "Hello {who}");
        let err: TaskError = template.render(&HashMap::new()).unwrap_err().into();
        assert_eq!(err.kind, TaskErrorKind::MissingVariable);
    }
}

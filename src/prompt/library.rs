//! Named prompt templates

use std::collections::HashMap;
use std::path::Path;

use crate::core::FrameworkResult;

use super::template::PromptTemplate;

/// Template used when a task does not name one
pub const DEFAULT_TASK_TEMPLATE: &str = "task_processing";

const TASK_PROCESSING: &str = "You are an AI agent tasked with processing the following task:

Task Name: {task_name}
Task Description: {task_description}
Task Data: {task_data}
Priority: {priority}

Please process this task and provide a detailed response. Consider the context and requirements carefully.";

const ANALYSIS: &str = "Analyze the following data and provide insights:

Data: {data}
Analysis Type: {analysis_type}
Context: {context}

Provide a comprehensive analysis with key findings and recommendations.";

const COLLABORATION: &str = "You are collaborating with other AI agents on a shared task:

Your Role: {role}
Task Context: {context}
Other Agents: {other_agents}
Shared Goal: {goal}

Coordinate with other agents and contribute to the shared objective.";

/// Registry of general templates plus per-task-type overrides
///
/// Lookup checks task-type overrides before general templates.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: HashMap<String, PromptTemplate>,
    task_prompts: HashMap<String, PromptTemplate>,
}

impl PromptLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library seeded with `task_processing`, `analysis` and `collaboration`
    pub fn with_defaults() -> Self {
        let mut library = Self::new();
        library.add_template(DEFAULT_TASK_TEMPLATE, TASK_PROCESSING);
        library.add_template("analysis", ANALYSIS);
        library.add_template("collaboration", COLLABORATION);
        library
    }

    pub fn add_template(&mut self, name: impl Into<String>, template: impl Into<String>) {
        let name = name.into();
        tracing::debug!(template = %name, "Added prompt template");
        self.templates
            .insert(name.clone(), PromptTemplate::new(name, template));
    }

    /// Register a template that takes precedence for `task_type`
    pub fn add_task_prompt(&mut self, task_type: impl Into<String>, template: impl Into<String>) {
        let task_type = task_type.into();
        tracing::debug!(task_type = %task_type, "Added task prompt");
        self.task_prompts.insert(
            task_type.clone(),
            PromptTemplate::new(format!("task_{}", task_type), template),
        );
    }

    /// Task-type override first, then general template
    pub fn resolve(&self, name: &str) -> Option<&PromptTemplate> {
        self.task_prompts
            .get(name)
            .or_else(|| self.templates.get(name))
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn task_prompt_count(&self) -> usize {
        self.task_prompts.len()
    }

    /// Load every `*.md` file in `dir` as a template named after the file stem
    ///
    /// Returns the number of templates loaded. Unreadable files are logged and skipped.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> FrameworkResult<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    self.add_template(stem, content);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load prompt");
                }
            }
        }

        tracing::info!(dir = %dir.display(), loaded, "Loaded prompt templates");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_present() {
        let library = PromptLibrary::with_defaults();
        assert_eq!(library.template_count(), 3);

        let task = library.resolve(DEFAULT_TASK_TEMPLATE).unwrap();
        assert_eq!(
            task.variables(),
            vec!["priority", "task_data", "task_description", "task_name"]
        );
    }

    #[test]
    fn test_task_prompt_overrides_template() {
        let mut library = PromptLibrary::with_defaults();
        library.add_task_prompt("analysis", "Trend of {data}");

        let resolved = library.resolve("analysis").unwrap();
        assert_eq!(resolved.name(), "task_analysis");
        assert_eq!(library.task_prompt_count(), 1);
        assert!(library.resolve("missing").is_none());
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("summary.md"), "Summarize {text}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut library = PromptLibrary::new();
        let loaded = library.load_dir(dir.path()).unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(library.resolve("summary").unwrap().variables(), vec!["text"]);
        assert!(library.resolve("notes").is_none());
    }
}

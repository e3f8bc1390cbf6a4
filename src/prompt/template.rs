//! `{variable}` prompt templates

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::core::{FrameworkError, FrameworkResult};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// A named template with `{variable}` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    name: String,
    template: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names, sorted and deduplicated
    pub fn variables(&self) -> Vec<String> {
        placeholder_regex()
            .captures_iter(&self.template)
            .map(|c| c[1].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Substitute every placeholder in a single pass
    ///
    /// Fails with `MissingVariable` naming the first placeholder without a value;
    /// no partial output is returned. Substituted values are not re-scanned.
    pub fn render(&self, vars: &HashMap<String, String>) -> FrameworkResult<String> {
        if let Some(missing) = self.variables().into_iter().find(|v| !vars.contains_key(v)) {
            return Err(FrameworkError::MissingVariable {
                template: self.name.clone(),
                variable: missing,
            });
        }

        let rendered = placeholder_regex().replace_all(&self.template, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_variables_discovered() {
        let t = PromptTemplate::new("t", "Hi {name}, your {thing} and {name} again");
        assert_eq!(t.variables(), vec!["name".to_string(), "thing".to_string()]);
    }

    #[test]
    fn test_render_all_supplied_leaves_no_placeholders() {
        let t = PromptTemplate::new("t", "Task {task_name} (priority {priority})");
        let out = t
            .render(&vars(&[("task_name", "sort"), ("priority", "5")]))
            .unwrap();
        assert_eq!(out, "Task sort (priority 5)");
        assert!(!out.contains('{') && !out.contains('}'));
    }

    #[test]
    fn test_render_missing_variable() {
        let t = PromptTemplate::new("greeting", "Hello {name} from {place}");
        let err = t.render(&vars(&[("name", "Ada")])).unwrap_err();
        match err {
            FrameworkError::MissingVariable { template, variable } => {
                assert_eq!(template, "greeting");
                assert_eq!(variable, "place");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_json_braces_are_not_placeholders() {
        let t = PromptTemplate::new("t", "Data: {data}");
        let out = t.render(&vars(&[("data", r#"{"k": 1}"#)])).unwrap();
        assert_eq!(out, r#"Data: {"k": 1}"#);
        assert!(PromptTemplate::new("t", r#"{"k": 1}"#).variables().is_empty());
    }
}

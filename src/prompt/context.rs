//! Conversation contexts with bounded history

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a role name; unknown names are rejected
    pub fn parse(name: &str) -> Option<Role> {
        match name {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (role, content) entry of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered conversation history keyed by an opaque id
///
/// Holds at most `max_turns` turns; the oldest turns are dropped first.
/// The system prompt belongs to the agent and is not part of the history.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    id: String,
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationContext {
    /// Create an empty context; `max_turns` is clamped to at least 1
    pub fn new(id: impl Into<String>, max_turns: usize) -> Self {
        Self {
            id: id.into(),
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a turn, then trim the oldest turns past the limit
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(Turn::new(role, content));
        self.trim();
    }

    /// Borrowing view of the history, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The history as the turn list handed to a provider
    pub fn render(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn set_max_turns(&mut self, max_turns: usize) {
        self.max_turns = max_turns.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_turn_order() {
        let mut ctx = ConversationContext::new("c1", 10);
        ctx.add_message(Role::User, "hi");
        ctx.add_message(Role::Assistant, "hello");

        let rendered = ctx.render();
        assert_eq!(rendered, vec![Turn::user("hi"), Turn::assistant("hello")]);
        assert_eq!(ctx.turns().count(), 2);
    }

    #[test]
    fn test_trims_oldest_first() {
        let mut ctx = ConversationContext::new("c1", 2);
        ctx.add_message(Role::User, "one");
        ctx.add_message(Role::Assistant, "two");
        ctx.add_message(Role::User, "three");

        let contents: Vec<_> = ctx.render().into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["two", "three"]);

        ctx.set_max_turns(1);
        assert_eq!(ctx.render()[0].content, "three");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("tool"), None);
    }
}

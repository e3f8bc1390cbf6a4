//! Prompt and conversation context layer
//!
//! - `PromptTemplate` - `{variable}` templates with strict rendering
//! - `PromptLibrary` - named templates and task-type overrides
//! - `ConversationContext` - bounded (role, content) history

pub mod context;
pub mod library;
pub mod template;

pub use context::{ConversationContext, Role, Turn};
pub use library::{PromptLibrary, DEFAULT_TASK_TEMPLATE};
pub use template::PromptTemplate;

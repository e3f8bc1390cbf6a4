//! Message broker
//!
//! Central registry and router shared by every agent:
//! - `MessageBroker` - agent registration, topic subscriptions, delivery
//! - `AgentInfo` / `Registration` - introspection records

pub mod broker;

pub use broker::{AgentInfo, MessageBroker, Registration};

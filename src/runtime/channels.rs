//! Channel type definitions for agent communication
//!
//! Each agent owns two channels:
//! - **Inbox** (unbounded mpsc): many producers (the broker on behalf of any
//!   sender), one consumer (the agent's message loop)
//! - **State** (watch): the current lifecycle state, observed by both loops so
//!   they can park while the agent is paused

use tokio::sync::{mpsc, watch};

use crate::core::{AgentState, Message};

// ============================================================================
// Channel Type Aliases
// ============================================================================

/// Sender half of an agent inbox (held by the agent handle)
pub type InboxSender = mpsc::UnboundedSender<Message>;

/// Receiver half of an agent inbox (drained by the message loop)
pub type InboxReceiver = mpsc::UnboundedReceiver<Message>;

/// Publishes lifecycle state changes
pub type StateSender = watch::Sender<AgentState>;

/// Observes lifecycle state changes
pub type StateReceiver = watch::Receiver<AgentState>;

// ============================================================================
// Channel Creation
// ============================================================================

/// Create a new inbox pair
pub fn create_inbox() -> (InboxSender, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Create a state channel starting at [`AgentState::Idle`]
pub fn create_state_channel() -> StateSender {
    let (tx, _) = watch::channel(AgentState::Idle);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_inbox_preserves_order() {
        let (tx, mut rx) = create_inbox();

        tx.send(Message::broadcast("a", "one", json!(1))).unwrap();
        tx.send(Message::broadcast("a", "two", json!(2))).unwrap();

        assert_eq!(rx.recv().await.unwrap().topic(), "one");
        assert_eq!(rx.recv().await.unwrap().topic(), "two");
    }

    #[tokio::test]
    async fn test_inbox_close() {
        let (tx, mut rx) = create_inbox();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_state_channel_wakes_observers() {
        let tx = create_state_channel();
        let mut rx = tx.subscribe();
        assert_eq!(*rx.borrow(), AgentState::Idle);

        tx.send_replace(AgentState::Running);
        let state = rx.wait_for(|s| s.is_running()).await.unwrap().clone();
        assert_eq!(state, AgentState::Running);
    }
}

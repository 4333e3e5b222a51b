//! Conversation messages and run requests.
//!
//! History is an ordered sequence of turns. Callers resend it every turn,
//! so nothing here is persisted.

use serde::{Deserialize, Serialize};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Developer,
    Tool,
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Developer => "developer",
            Self::Tool => "tool",
            Self::Function => "function",
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Input for one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunRequest {
    /// The user's message for this turn
    pub user_input: String,

    /// Prior turns, oldest first
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,

    /// Opaque identifier chosen by the caller
    pub conversation_id: String,
}

impl WorkflowRunRequest {
    pub fn new(conversation_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            conversation_history: Vec::new(),
            conversation_id: conversation_id.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationMessage>) -> Self {
        self.conversation_history = history;
        self
    }

    /// True when there is no prior turn to continue from
    pub fn is_first_turn(&self) -> bool {
        self.conversation_history.is_empty()
    }
}

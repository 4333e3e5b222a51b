//! Domain types for the lexllm orchestrator.
//!
//! This module contains the core data structures:
//! - Messages: conversation turns and run requests
//! - Articles: retrieved documents and citations
//! - Events: the stream record schema
//! - Run: orchestration run state

pub mod article;
pub mod events;
pub mod message;
pub mod run;

// Re-export commonly used types
pub use article::{merge_articles, ArticleId, LexArticle, Source};
pub use events::{
    new_step_id, ErrorData, EventKind, HistoryData, StepStatus, StreamEvent, ToolCallData,
    WorkflowStepData,
};
pub use message::{ConversationMessage, Role, WorkflowRunRequest};
pub use run::RunState;

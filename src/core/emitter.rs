//! Wire formatting for stream events.
//!
//! The emitter only builds strings. Writing them to a transport is the
//! caller's job.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    ConversationMessage, ErrorData, EventKind, HistoryData, Source, ToolCallData,
    WorkflowStepData,
};

/// Formats domain events into newline-terminated JSON records
#[derive(Debug, Clone)]
pub struct EventEmitter {
    conversation_id: String,
    run_id: String,
}

impl EventEmitter {
    /// Create an emitter with a fresh run id
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self::with_run_id(conversation_id, Uuid::new_v4().to_string())
    }

    /// Create an emitter for an existing run id
    pub fn with_run_id(conversation_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            run_id: run_id.into(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Serialize one event. Every other constructor goes through here.
    ///
    /// A payload that serializes to `null` is omitted from the record.
    pub fn emit<T: Serialize>(&self, kind: EventKind, data: T) -> String {
        match serde_json::to_value(data) {
            Ok(Value::Null) => self.frame(kind, None),
            Ok(value) => self.frame(kind, Some(value)),
            Err(e) => {
                warn!(event = kind.as_str(), error = %e, "Failed to serialize event payload");
                self.frame(
                    EventKind::Error,
                    Some(json!({
                        "message": format!("Failed to serialize {} payload: {}", kind.as_str(), e),
                        "code": "serialization",
                    })),
                )
            }
        }
    }

    fn frame(&self, kind: EventKind, data: Option<Value>) -> String {
        let mut record = Map::new();
        record.insert("event".to_string(), Value::from(kind.as_str()));
        record.insert(
            "conversation_id".to_string(),
            Value::from(self.conversation_id.as_str()),
        );
        record.insert("run_id".to_string(), Value::from(self.run_id.as_str()));
        if let Some(data) = data {
            record.insert("data".to_string(), data);
        }

        let mut line = Value::Object(record).to_string();
        line.push('\n');
        line
    }

    pub fn stream_start(&self, history: &[ConversationMessage]) -> String {
        self.emit(
            EventKind::StreamStart,
            HistoryData {
                conversation_history: history.to_vec(),
            },
        )
    }

    pub fn stream_end(&self, history: &[ConversationMessage]) -> String {
        self.emit(
            EventKind::StreamEnd,
            HistoryData {
                conversation_history: history.to_vec(),
            },
        )
    }

    pub fn text_chunk(&self, text: &str) -> String {
        self.emit(EventKind::TextChunk, text)
    }

    pub fn reasoning_chunk(&self, text: &str) -> String {
        self.emit(EventKind::ReasoningChunk, text)
    }

    pub fn tool_call(&self, name: impl Into<String>, input: Value) -> String {
        self.emit(
            EventKind::ToolCall,
            ToolCallData {
                name: name.into(),
                input,
            },
        )
    }

    pub fn sources(&self, sources: &[Source]) -> String {
        self.emit(EventKind::Sources, sources)
    }

    pub fn workflow_step(&self, step: &WorkflowStepData) -> String {
        self.emit(EventKind::WorkflowStep, step)
    }

    pub fn error(&self, message: impl Into<String>, code: Option<&str>) -> String {
        self.emit(
            EventKind::Error,
            ErrorData {
                message: message.into(),
                code: code.map(str::to_string),
            },
        )
    }
}

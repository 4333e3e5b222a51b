//! Stream event schema.
//!
//! Every record a run produces is a `StreamEvent`, serialized as one line of
//! JSON. The `data` payload shape depends on the event kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::message::ConversationMessage;

/// One record on the wire.
///
/// `run_id` is fixed for the lifetime of an orchestrator, so clients can
/// correlate every record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Kind of event
    pub event: EventKind,

    /// Conversation this run belongs to (caller supplied)
    pub conversation_id: String,

    /// Correlation id of the run
    pub run_id: String,

    /// Kind-specific payload, omitted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StreamEvent {
    /// Parse one NDJSON record
    pub fn from_record(record: &str) -> serde_json::Result<Self> {
        serde_json::from_str(record.trim_end())
    }
}

/// Types of events a run can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First record of a run, carries the incoming history
    StreamStart,

    /// Last record of a successful run, carries the rebuilt history
    StreamEnd,

    /// A fragment of the answer
    TextChunk,

    /// A fragment of visible model deliberation
    ReasoningChunk,

    /// A side-effecting call made by a step
    ToolCall,

    /// Documents cited by the answer
    Sources,

    /// A step changed state
    WorkflowStep,

    /// The run failed
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamStart => "stream_start",
            Self::StreamEnd => "stream_end",
            Self::TextChunk => "text_chunk",
            Self::ReasoningChunk => "reasoning_chunk",
            Self::ToolCall => "tool_call",
            Self::Sources => "sources",
            Self::WorkflowStep => "workflow_step",
            Self::Error => "error",
        }
    }
}

/// Status of a step transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step began executing
    Started,

    /// Optional progress update, may repeat
    InProgress,

    /// Step finished successfully
    Completed,

    /// Step reported its own failure
    Failed,
}

/// Payload of a `workflow_step` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepData {
    pub step_id: String,
    pub name: String,
    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowStepData {
    pub fn new(step_id: impl Into<String>, name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step_id: step_id.into(),
            name: name.into(),
            status,
            input: None,
            update: None,
            output: None,
            error: None,
        }
    }

    /// A `started` transition with a freshly generated step id
    pub fn started(name: impl Into<String>) -> Self {
        Self::new(new_step_id(), name, StepStatus::Started)
    }

    /// Another transition of the same step
    pub fn transition(&self, status: StepStatus) -> Self {
        Self::new(self.step_id.clone(), self.name.clone(), status)
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_update(mut self, update: impl Into<Value>) -> Self {
        self.update = Some(update.into());
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Fresh identifier for one step invocation
pub fn new_step_id() -> String {
    Uuid::new_v4().to_string()
}

/// Payload of `stream_start` and `stream_end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryData {
    pub conversation_history: Vec<ConversationMessage>,
}

/// Payload of a `tool_call` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    pub name: String,
    pub input: Value,
}

/// Payload of an `error` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

//! Core orchestration logic.
//!
//! This module contains:
//! - EventEmitter: Wire formatting of stream events
//! - RunContext: Per-run shared state
//! - WorkflowStep: The step contract
//! - Orchestrator: Main execution engine
//! - WorkflowRegistry: Workflow lookup by id

pub mod context;
pub mod emitter;
pub mod orchestrator;
pub mod registry;
pub mod step;

// Re-export commonly used types
pub use context::{keys, RunContext};
pub use emitter::EventEmitter;
pub use orchestrator::{rebuild_history, Orchestrator, RecordStream};
pub use registry::{
    run_request_schema, RegistryError, StepMetadata, WorkflowDefinition, WorkflowMetadata,
    WorkflowRegistry,
};
pub use step::{StepOutput, StreamClosed, WorkflowStep};

//! lexllm - Streaming chat workflows over the Lex knowledge base
//!
//! A workflow is an ordered list of steps sharing a per-run context. The
//! orchestrator runs the steps one after another and streams every event
//! they produce as newline-delimited JSON, bracketed by `stream_start` and
//! `stream_end` records.
//!
//! # Architecture
//!
//! - Each run gets a fresh orchestrator, context and run id
//! - Records are produced lazily; dropping the stream abandons the run
//! - A failing step ends the run with a single `error` record
//! - On success the conversation history is rebuilt from the context
//!
//! # Modules
//!
//! - `domain`: Data structures (messages, articles, stream events, run state)
//! - `core`: Orchestration logic (EventEmitter, RunContext, Orchestrator, registry)
//! - `adapters`: External systems (Lex DB, OpenAI, OpenRouter)
//! - `tools`: Standard steps (knowledge-base search, response generation)
//! - `workflows`: Built-in workflow definitions
//! - `server`: HTTP transport
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a workflow, printing NDJSON records
//! lexllm run alpha_workflow_v1 "Hvem byggede Rundetårn?"
//!
//! # Serve all workflows over HTTP
//! lexllm serve --address 0.0.0.0:8000
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod tools;
pub mod workflows;

// Re-export main types at crate root for convenience
pub use core::{EventEmitter, Orchestrator, RunContext, WorkflowRegistry, WorkflowStep};
pub use domain::{
    ConversationMessage, EventKind, LexArticle, RunState, StreamEvent, WorkflowRunRequest,
};

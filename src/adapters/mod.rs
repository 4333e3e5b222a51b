//! Adapters for external systems.
//!
//! - `lex_db`: the Lex knowledge-base service
//! - `llm`: chat model providers

pub mod lex_db;
pub mod llm;

// Re-export commonly used types
pub use lex_db::{LexDbApi, LexDbClient, LexDbConnector, LexDbError, SearchMethod, SearchQuery};
pub use llm::{LlmProvider, OpenAiProvider, OpenRouterProvider, TextStream};

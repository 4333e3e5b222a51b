//! Standard workflow steps.
//!
//! - `knowledge_base`: retrieval from Lex DB
//! - `response_generation`: grounded answer streaming with source tracking
//! - `attribution`: classifier deciding which articles an answer used

pub mod attribution;
pub mod knowledge_base;
pub mod response_generation;

pub use attribution::{extract_used_sources, parse_attribution, AttributionError};
pub use knowledge_base::KnowledgeBaseSearchStep;
pub use response_generation::{cited_articles, system_prompt_with_articles, ResponseGenerationStep};

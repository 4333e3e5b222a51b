//! Built-in workflows.
//!
//! Every workflow the service offers is registered here, explicitly, when
//! the registry is built.

pub mod demo;
pub mod prompts;

use std::sync::Arc;

use anyhow::Result;

use crate::adapters::{LexDbConnector, LlmProvider, OpenAiProvider, OpenRouterProvider, SearchMethod};
use crate::config::ResolvedConfig;
use crate::core::{keys, StepMetadata, WorkflowDefinition, WorkflowMetadata, WorkflowRegistry, WorkflowStep};
use crate::tools::{KnowledgeBaseSearchStep, ResponseGenerationStep};

use prompts::{ALPHA_V1_DEFERRAL_MESSAGE, ALPHA_V1_SYSTEM_PROMPT};

pub const ALPHA_V1: &str = "alpha_workflow_v1";
pub const ALPHA_V1_GEMMA: &str = "alpha_workflow_v1_gemma";
pub const BETA_V1: &str = "beta_workflow_v1";

pub const ALPHA_INDEX: &str = "openai_large_3_sections";
pub const BETA_INDEX: &str = "e5_small";

const AUTHOR: &str = "Simon Enni";

/// Retrieval and model choices for one retrieval-augmented workflow
pub struct RagWorkflow {
    pub workflow_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub index: &'static str,
    pub method: SearchMethod,
    pub top_k: usize,
    pub tags: &'static [&'static str],
}

impl RagWorkflow {
    /// Two steps: knowledge-base search, then grounded generation
    pub fn build(&self, connector: LexDbConnector, provider: Arc<dyn LlmProvider>) -> WorkflowDefinition {
        let model = provider.model().to_string();

        let search = KnowledgeBaseSearchStep::new(connector, self.index)
            .with_method(self.method)
            .with_top_k(self.top_k);
        let generation =
            ResponseGenerationStep::new(provider, ALPHA_V1_SYSTEM_PROMPT, ALPHA_V1_DEFERRAL_MESSAGE);

        let steps: Vec<Arc<dyn WorkflowStep>> = vec![Arc::new(search), Arc::new(generation)];

        let metadata = WorkflowMetadata::new(self.workflow_id, self.name, self.description)
            .with_step(
                StepMetadata::new(
                    crate::tools::knowledge_base::STEP_NAME,
                    format!("Queries the knowledge base index '{}' using {}.", self.index, self.method),
                )
                .reads(&[keys::USER_INPUT])
                .writes(&[keys::RETRIEVED_DOCS]),
            )
            .with_step(
                StepMetadata::new(
                    crate::tools::response_generation::STEP_NAME,
                    format!(
                        "Formats a prompt using the retrieved documents and streams the response from {}.",
                        model
                    ),
                )
                .reads(&[keys::RETRIEVED_DOCS, keys::CONVERSATION_HISTORY, keys::USER_INPUT])
                .writes(&[keys::FINAL_RESPONSE, keys::USED_SOURCES, keys::SYSTEM_PROMPT]),
            )
            .with_author(AUTHOR)
            .with_tags(self.tags);

        WorkflowDefinition::new(metadata, steps)
    }
}

pub const ALPHA_V1_WORKFLOW: RagWorkflow = RagWorkflow {
    workflow_id: ALPHA_V1,
    name: "Alpha Workflow v1",
    description: "Version 1 of the workflow. Performs a simple retrieval-augmented generation (RAG) \
                  using a knowledge base and outputs a source list.",
    index: ALPHA_INDEX,
    method: SearchMethod::VectorSearch,
    top_k: 10,
    tags: &["rag", "retrieval", "generation", "knowledge base", "openai"],
};

pub const ALPHA_V1_GEMMA_WORKFLOW: RagWorkflow = RagWorkflow {
    workflow_id: ALPHA_V1_GEMMA,
    name: "Alpha Workflow v1 (Gemma)",
    description: "Version 1 of the workflow using Google Gemma 3 27B via OpenRouter. Performs a simple \
                  retrieval-augmented generation (RAG) using a knowledge base and outputs a source list.",
    index: ALPHA_INDEX,
    method: SearchMethod::VectorSearch,
    top_k: 10,
    tags: &["rag", "retrieval", "generation", "knowledge base", "openrouter", "gemma"],
};

pub const BETA_V1_WORKFLOW: RagWorkflow = RagWorkflow {
    workflow_id: BETA_V1,
    name: "Beta Workflow v1",
    description: "Version 1 of the beta workflow using Google Gemma 3 27B via OpenRouter and the e5 \
                  embedding model hosted locally. Performs a simple retrieval-augmented generation (RAG) \
                  using a knowledge base and outputs a source list.",
    index: BETA_INDEX,
    method: SearchMethod::VectorSearch,
    top_k: 10,
    tags: &["rag", "retrieval", "generation", "knowledge base", "openrouter", "gemma"],
};

/// Registry holding every built-in workflow, wired to the configured services
pub fn builtin_registry(config: &ResolvedConfig) -> Result<WorkflowRegistry> {
    let connector = LexDbConnector::http(config.lex_db_host.clone());

    let openai: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.openai.api_key.clone(),
        config.openai.base_url.clone(),
    ));
    let gemma: Arc<dyn LlmProvider> = Arc::new(OpenRouterProvider::new(
        config.openrouter.api_key.clone(),
        config.openrouter.base_url.clone(),
    ));

    let mut registry = WorkflowRegistry::new();
    registry.register(ALPHA_V1_WORKFLOW.build(connector.clone(), openai))?;
    registry.register(ALPHA_V1_GEMMA_WORKFLOW.build(connector.clone(), gemma.clone()))?;
    registry.register(BETA_V1_WORKFLOW.build(connector, gemma))?;
    registry.register(demo::definition(true))?;

    Ok(registry)
}

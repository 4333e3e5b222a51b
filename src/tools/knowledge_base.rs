//! Knowledge-base search step.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, instrument};

use crate::adapters::{LexDbConnector, SearchMethod, SearchQuery};
use crate::core::{keys, EventEmitter, RunContext, StepOutput, WorkflowStep};

pub const STEP_NAME: &str = "Knowledge Base Search";
pub const DEFAULT_TOP_K: usize = 10;

/// Retrieves candidate articles for the user's question.
///
/// Reads `user_input`, writes `retrieved_docs`. Emits no records.
pub struct KnowledgeBaseSearchStep {
    connector: LexDbConnector,
    index: String,
    method: SearchMethod,
    top_k: usize,
    rrf_k: Option<u32>,
}

impl KnowledgeBaseSearchStep {
    pub fn new(connector: LexDbConnector, index: impl Into<String>) -> Self {
        Self {
            connector,
            index: index.into(),
            method: SearchMethod::default(),
            top_k: DEFAULT_TOP_K,
            rrf_k: None,
        }
    }

    pub fn with_method(mut self, method: SearchMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_rrf_k(mut self, rrf_k: u32) -> Self {
        self.rrf_k = Some(rrf_k);
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn method(&self) -> SearchMethod {
        self.method
    }
}

#[async_trait]
impl WorkflowStep for KnowledgeBaseSearchStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    #[instrument(skip_all, fields(index = %self.index, method = %self.method))]
    async fn run(
        &self,
        ctx: &mut RunContext,
        _emitter: &EventEmitter,
        _out: &mut StepOutput,
    ) -> Result<()> {
        let user_input = ctx.get_str(keys::USER_INPUT).unwrap_or_default().trim();

        let mut query = SearchQuery::new(user_input, self.top_k);
        if let Some(rrf_k) = self.rrf_k {
            query = query.with_rrf_k(rrf_k);
        }

        let docs = self
            .connector
            .search(&self.index, self.method, &query)
            .await
            .with_context(|| format!("{} on index '{}' failed", self.method, self.index))?;

        info!(docs = docs.len(), "Retrieved documents");
        ctx.insert(keys::RETRIEVED_DOCS, &docs)?;
        Ok(())
    }
}

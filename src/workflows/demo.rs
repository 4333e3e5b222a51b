//! Scripted demo workflow.
//!
//! Exercises every event kind without touching the knowledge base or a
//! model, so clients can be developed against a realistic stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::core::{
    keys, EventEmitter, RunContext, StepMetadata, StepOutput, WorkflowDefinition, WorkflowMetadata,
    WorkflowStep,
};
use crate::domain::{ArticleId, Source};

pub const WORKFLOW_ID: &str = "test_workflow";

/// Maximum characters per `text_chunk` record
const CHUNK_CHARS: usize = 25;

const RESPONSE_PARTS: &[&str] = &[
    "Based on my analysis of multiple sources, I can provide you with a comprehensive answer. ",
    "\n\n**Overview**\n\nArtificial Intelligence represents a transformative field that combines ",
    "computational power with sophisticated algorithms to simulate human-like decision making. ",
    "The recent advances in this area have been particularly remarkable, with breakthrough ",
    "developments in natural language processing, computer vision, and autonomous systems.\n\n",
    "**Key Developments**\n\n1. **Neural Network Architectures**: Modern deep learning models ",
    "have evolved significantly, with transformer architectures revolutionizing how we approach ",
    "sequence modeling and attention mechanisms.\n\n2. **Training Methodologies**: ",
    "Self-supervised learning and few-shot learning approaches have reduced the dependency ",
    "on large labeled datasets, making AI more accessible and practical.\n\n",
    "3. **Ethical Considerations**: The field increasingly emphasizes responsible AI development, ",
    "focusing on fairness, transparency, and accountability in algorithmic decision-making.\n\n",
    "**Practical Applications**\n\nThese advances translate into real-world benefits across ",
    "healthcare, education, transportation, and scientific research. The integration of AI ",
    "systems into everyday workflows continues to accelerate, with particular emphasis on ",
    "human-AI collaboration rather than replacement.\n\n**Future Outlook**\n\n",
    "The trajectory suggests continued innovation in efficiency, interpretability, and ",
    "multimodal capabilities. As these technologies mature, we can expect more sophisticated ",
    "applications that better understand context and nuance in human communication.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    QueryAnalysis,
    Search,
    Synthesis,
    Response,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Self::QueryAnalysis => "Query Analysis",
            Self::Search => "Knowledge Base Search",
            Self::Synthesis => "Information Synthesis",
            Self::Response => "Response Generation",
        }
    }
}

/// One stage of the demo
struct DemoStep {
    stage: Stage,
    paced: bool,
}

impl DemoStep {
    async fn pause(&self, ms: u64) {
        if self.paced {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    async fn reason(
        &self,
        emitter: &EventEmitter,
        out: &mut StepOutput,
        thoughts: &[(&str, u64)],
    ) -> Result<()> {
        for (thought, ms) in thoughts {
            out.send(emitter.reasoning_chunk(thought)).await?;
            self.pause(*ms).await;
        }
        Ok(())
    }
}

fn demo_sources() -> Vec<Source> {
    let source = |id: &str, title: &str, url: &str| Source {
        id: ArticleId::from(id),
        title: title.to_string(),
        url: url.to_string(),
    };

    vec![
        source("kb_1", "Introduction to Neural Networks", "https://internal.kb/neural-networks-101"),
        source("kb_2", "Machine Learning Fundamentals", "https://internal.kb/ml-fundamentals"),
        source("web_1", "Recent Advances in AI Research", "https://arxiv.org/abs/2024.12345"),
        source(
            "web_2",
            "Practical Applications of Deep Learning",
            "https://research.google.com/pubs/deep-learning-apps",
        ),
        source("web_3", "Ethics in Artificial Intelligence", "https://stanford.edu/ai-ethics-2024"),
    ]
}

/// Split `text` into pieces of at most `max_chars` characters
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[async_trait]
impl WorkflowStep for DemoStep {
    fn name(&self) -> &str {
        self.stage.name()
    }

    async fn run(
        &self,
        ctx: &mut RunContext,
        emitter: &EventEmitter,
        out: &mut StepOutput,
    ) -> Result<()> {
        let user_input = ctx.get_str(keys::USER_INPUT).unwrap_or_default().to_string();

        match self.stage {
            Stage::QueryAnalysis => {
                self.pause(300).await;
                out.progress(emitter, "Parsing user intent and identifying required information...")
                    .await?;
                self.reason(
                    emitter,
                    out,
                    &[
                        ("Let me analyze this query step by step. ", 200),
                        ("The user seems to be asking about a complex topic that will require ", 100),
                        ("multiple sources of information. I should search my knowledge base first, ", 150),
                        ("then cross-reference with external sources to provide a comprehensive answer.", 200),
                    ],
                )
                .await?;
            }
            Stage::Search => {
                self.pause(400).await;
                let kb_call = json!({"query": user_input, "limit": 10, "similarity_threshold": 0.8});
                out.send(emitter.tool_call("search_knowledge_base", kb_call)).await?;
                out.progress(emitter, "Found 15 potentially relevant documents, ranking by relevance...")
                    .await?;

                let web_call = json!({"query": user_input, "num_results": 5, "recency_days": 30});
                out.send(emitter.tool_call("web_search", web_call)).await?;
                self.pause(300).await;
                out.progress(emitter, "Retrieving and processing web search results...")
                    .await?;

                self.pause(200).await;
                out.send(emitter.sources(&demo_sources())).await?;
            }
            Stage::Synthesis => {
                self.pause(300).await;
                self.reason(
                    emitter,
                    out,
                    &[
                        ("Now I need to synthesize information from multiple sources. ", 150),
                        ("I'll start with the foundational concepts from the knowledge base, ", 100),
                        ("then incorporate recent developments from external sources to provide ", 120),
                        ("a comprehensive and up-to-date response.", 200),
                    ],
                )
                .await?;
                out.progress(emitter, "Cross-referencing sources and identifying key themes...")
                    .await?;

                let checked: Vec<String> = demo_sources().iter().take(3).map(|s| s.id.to_string()).collect();
                let fact_call = json!({
                    "claims": [
                        "AI can process natural language",
                        "Neural networks require training data",
                    ],
                    "sources": checked,
                });
                out.send(emitter.tool_call("fact_checker", fact_call)).await?;
                self.pause(400).await;
                out.progress(emitter, "Fact-checking complete, organizing response structure...")
                    .await?;
            }
            Stage::Response => {
                self.pause(200).await;
                self.reason(
                    emitter,
                    out,
                    &[
                        ("I'll structure my response to be clear and informative. ", 100),
                        ("I'll start with a brief overview, then dive into specific details, ", 120),
                        ("and conclude with practical implications.", 150),
                    ],
                )
                .await?;

                for part in RESPONSE_PARTS {
                    for chunk in chunk_text(part, CHUNK_CHARS) {
                        out.send(emitter.text_chunk(&chunk)).await?;
                        self.pause(80).await;
                    }
                }
                self.pause(100).await;

                ctx.insert(keys::FINAL_RESPONSE, RESPONSE_PARTS.concat())?;
            }
        }

        Ok(())
    }
}

/// The demo workflow. `paced` adds the short delays a live client expects.
pub fn definition(paced: bool) -> WorkflowDefinition {
    let stages = [Stage::QueryAnalysis, Stage::Search, Stage::Synthesis, Stage::Response];
    let steps: Vec<Arc<dyn WorkflowStep>> = stages
        .iter()
        .map(|&stage| Arc::new(DemoStep { stage, paced }) as Arc<dyn WorkflowStep>)
        .collect();

    let metadata = WorkflowMetadata::new(
        WORKFLOW_ID,
        "Test Workflow",
        "Performs a mocked multi-step research and synthesis workflow.",
    )
    .with_step(
        StepMetadata::new(Stage::QueryAnalysis.name(), "Reasons about the user's intent.")
            .reads(&[keys::USER_INPUT]),
    )
    .with_step(
        StepMetadata::new(Stage::Search.name(), "Simulates knowledge base and web search tool calls.")
            .reads(&[keys::USER_INPUT]),
    )
    .with_step(StepMetadata::new(
        Stage::Synthesis.name(),
        "Simulates cross-referencing and fact checking.",
    ))
    .with_step(
        StepMetadata::new(Stage::Response.name(), "Streams a canned answer in small chunks.")
            .writes(&[keys::FINAL_RESPONSE]),
    )
    .with_tags(&["demo", "mock"]);

    WorkflowDefinition::new(metadata, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_respects_char_boundaries() {
        let chunks = chunk_text("Æbleskiver og æblegrød", 5);

        assert_eq!(chunks, vec!["Æbles", "kiver", " og æ", "blegr", "ød"]);
        assert!(chunk_text("", 25).is_empty());
    }

    #[test]
    fn test_definition_shape() {
        let workflow = definition(false);

        assert_eq!(workflow.id(), WORKFLOW_ID);
        assert_eq!(
            workflow.step_names(),
            vec!["Query Analysis", "Knowledge Base Search", "Information Synthesis", "Response Generation"]
        );
        assert_eq!(workflow.metadata.steps.len(), 4);
    }
}

//! Source attribution.
//!
//! After an answer has been generated, a second model call decides which of
//! the candidate articles the answer actually drew on. Any failure along the
//! way means "no sources": attribution never fails a run.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::adapters::LlmProvider;
use crate::domain::{ConversationMessage, LexArticle};

const ANALYST_INSTRUCTION: &str =
    "You are a careful analyst who identifies which sources were used in a response from a chatbot.";

/// Classifier output that could not be used
#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("attribution answer is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attribution answer is not a list of ids: {0}")]
    NotAList(String),
}

/// Messages asking the classifier which candidates `response` used
pub fn attribution_messages(response: &str, candidates: &[LexArticle]) -> Vec<ConversationMessage> {
    let source_descriptions = candidates
        .iter()
        .map(|doc| format!("ID: {} | Title: {} | Content: {}", doc.id, doc.title, doc.text))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Analyze the assistant's response below and determine which of the provided sources were actually used to generate the answer.\n\
         \n\
         Return ONLY a JSON-formatted list of source IDs that are directly referenced or used in the response.\n\
         If no sources were used, return an empty list.\n\
         \n\
         Do not include explanations or markdown formatting.\n\
         \n\
         ## Sources\n\
         {}\n\
         \n\
         ## Assistant Response\n\
         {}\n\
         \n\
         ## Expected Output Format\n\
         [\"id1\", \"id2\", ...]\n",
        source_descriptions, response
    );

    vec![
        ConversationMessage::system(ANALYST_INSTRUCTION),
        ConversationMessage::user(prompt),
    ]
}

/// Strip a surrounding markdown code fence (with or without a `json` tag)
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };

    body.split("```").next().unwrap_or_default().trim()
}

/// Parse the classifier's answer into raw id values.
/// An empty answer is an empty list.
pub fn parse_attribution(raw: &str) -> Result<Vec<Value>, AttributionError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(body)? {
        Value::Array(ids) => Ok(ids),
        other => Err(AttributionError::NotAList(other.to_string())),
    }
}

/// Candidates the classifier says `response` used, in candidate order
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub async fn extract_used_sources(
    provider: &dyn LlmProvider,
    response: &str,
    candidates: &[LexArticle],
) -> Vec<LexArticle> {
    if response.trim().is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let answer = match provider.generate(&attribution_messages(response, candidates)).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Source attribution call failed, reporting no sources");
            return Vec::new();
        }
    };

    let ids = match parse_attribution(&answer) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, answer = %answer, "Failed to parse attribution result, reporting no sources");
            return Vec::new();
        }
    };

    let used: Vec<LexArticle> = candidates
        .iter()
        .filter(|doc| ids.iter().any(|id| doc.id.matches(id)))
        .cloned()
        .collect();

    debug!(used = used.len(), "Attributed sources");
    used
}

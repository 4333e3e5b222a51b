//! Grounded response generation.
//!
//! Articles cited earlier in a conversation travel with the conversation
//! itself: the system prompt this step produces ends with an `# Artikler`
//! block holding every cited article, and on the next turn that block is read
//! back from the head system message. Newly retrieved articles are offered to
//! the model in the user message as "Potentielle kilder".

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument};

use crate::adapters::LlmProvider;
use crate::core::{keys, EventEmitter, RunContext, StepOutput, WorkflowStep};
use crate::domain::{merge_articles, ArticleId, ConversationMessage, LexArticle, Role, Source};

use super::attribution::extract_used_sources;

pub const STEP_NAME: &str = "Response Generation";

const ARTICLES_HEADING: &str = "# Artikler";
const CLOSING_TAG: &str = "</article>";
const ESCAPED_CLOSING_TAG: &str = "<\\/article>";

static ARTICLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<article id="([^"]*)" title="([^"]*)" url="([^"]*)">\n(.*?)\n</article>"#)
        .expect("article pattern is valid")
});

/// Answers the user's question from retrieved articles, then reports which
/// articles the answer used.
///
/// Reads `retrieved_docs`, `user_input`, `conversation_history`.
/// Writes `final_response`, `used_sources`, `system_prompt`.
pub struct ResponseGenerationStep {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
    deferral_message: String,
}

impl ResponseGenerationStep {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        system_prompt: impl Into<String>,
        deferral_message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
            deferral_message: deferral_message.into(),
        }
    }

    /// Prompt for this turn.
    ///
    /// On the first turn this is a fresh system + user pair. On follow-ups the
    /// incoming history is reused with its head system message rewritten to
    /// carry the articles cited so far.
    pub fn build_messages(
        &self,
        history: &[ConversationMessage],
        cited: &[LexArticle],
        candidates: &[LexArticle],
        user_input: &str,
    ) -> Vec<ConversationMessage> {
        let system = ConversationMessage::system(system_prompt_with_articles(&self.system_prompt, cited));
        let user = ConversationMessage::user(user_message(candidates, user_input));

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system);
        messages.extend(
            history
                .iter()
                .skip_while(|m| m.role == Role::System)
                .cloned(),
        );
        messages.push(user);
        messages
    }
}

#[async_trait]
impl WorkflowStep for ResponseGenerationStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    #[instrument(skip_all, fields(provider = %self.provider.name(), model = %self.provider.model()))]
    async fn run(
        &self,
        ctx: &mut RunContext,
        emitter: &EventEmitter,
        out: &mut StepOutput,
    ) -> Result<()> {
        let retrieved: Vec<LexArticle> = ctx.get_as(keys::RETRIEVED_DOCS)?.unwrap_or_default();
        let history: Vec<ConversationMessage> =
            ctx.get_as(keys::CONVERSATION_HISTORY)?.unwrap_or_default();
        let cited = cited_articles(&history);

        if retrieved.is_empty() {
            info!(cited = cited.len(), "No documents retrieved, deferring");
            out.send(emitter.text_chunk(&self.deferral_message)).await?;
            ctx.insert(keys::FINAL_RESPONSE, &self.deferral_message)?;
            ctx.insert(keys::USED_SOURCES, &cited)?;
            return Ok(());
        }

        let user_input = ctx.get_str(keys::USER_INPUT).unwrap_or_default().trim().to_string();

        let candidates: Vec<LexArticle> = retrieved
            .iter()
            .filter(|doc| !cited.iter().any(|c| c.id == doc.id))
            .cloned()
            .collect();

        let messages = self.build_messages(&history, &cited, &candidates, &user_input);

        let mut stream = self
            .provider
            .generate_stream(&messages)
            .await
            .context("Failed to start response generation")?;

        let mut full_response = String::new();
        while let Some(delta) = stream.next().await {
            let delta = delta.context("Response stream failed")?;
            full_response.push_str(&delta);
            out.send(emitter.text_chunk(&delta)).await?;
        }
        ctx.insert(keys::FINAL_RESPONSE, &full_response)?;

        let mut pool = cited.clone();
        merge_articles(&mut pool, &candidates);
        let used = extract_used_sources(self.provider.as_ref(), &full_response, &pool).await;

        let mut merged = cited;
        let added = merge_articles(&mut merged, &used);
        let sources: Vec<Source> = added.iter().map(LexArticle::to_source).collect();

        info!(
            response_len = full_response.len(),
            used = used.len(),
            new_sources = sources.len(),
            "Generated response"
        );
        out.send(emitter.sources(&sources)).await?;

        ctx.insert(keys::USED_SOURCES, &merged)?;
        ctx.insert(
            keys::SYSTEM_PROMPT,
            system_prompt_with_articles(&self.system_prompt, &merged),
        )?;
        Ok(())
    }
}

/// User message offering `candidates` alongside the question
pub fn user_message(candidates: &[LexArticle], user_input: &str) -> String {
    if candidates.is_empty() {
        return format!("**Brugerens spørgsmål:**\n{}", user_input);
    }

    let docs = candidates
        .iter()
        .map(|doc| format!("Titel: {}\nIndhold: {}", doc.title, doc.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "## Potentielle kilder (hentet fra Lex)\n{}\n\n---\n\n**Brugerens spørgsmål:**\n{}",
        docs, user_input
    )
}

/// Base instruction followed by the block of cited articles, if any
pub fn system_prompt_with_articles(base: &str, cited: &[LexArticle]) -> String {
    if cited.is_empty() {
        return base.to_string();
    }
    format!("{}\n\n{}", base.trim_end(), render_articles(cited))
}

/// Render articles as a machine-readable `# Artikler` block.
///
/// The id is written as JSON so `42` and `"42"` stay distinct, and closing
/// tags inside a body are escaped so the block parses back unchanged.
pub fn render_articles(articles: &[LexArticle]) -> String {
    let mut block = String::from(ARTICLES_HEADING);
    for article in articles {
        block.push_str(&format!(
            "\n<article id=\"{}\" title=\"{}\" url=\"{}\">\n{}\n</article>",
            escape_attr(&id_attr(&article.id)),
            escape_attr(&article.title),
            escape_attr(&article.url),
            article.text.replace(CLOSING_TAG, ESCAPED_CLOSING_TAG)
        ));
    }
    block
}

/// Articles recorded in the `# Artikler` block of `prompt`
pub fn parse_articles(prompt: &str) -> Vec<LexArticle> {
    let Some(start) = prompt.find(ARTICLES_HEADING) else {
        return Vec::new();
    };

    ARTICLE_PATTERN
        .captures_iter(&prompt[start..])
        .map(|caps| LexArticle {
            id: parse_id_attr(&unescape_attr(&caps[1])),
            title: unescape_attr(&caps[2]),
            url: unescape_attr(&caps[3]),
            text: caps[4].replace(ESCAPED_CLOSING_TAG, CLOSING_TAG),
        })
        .collect()
}

/// Articles cited earlier in the conversation, read from its head system message
pub fn cited_articles(history: &[ConversationMessage]) -> Vec<LexArticle> {
    match history.first() {
        Some(first) if first.role == Role::System => parse_articles(&first.content),
        _ => Vec::new(),
    }
}

fn id_attr(id: &ArticleId) -> String {
    serde_json::to_string(id).unwrap_or_else(|_| id.to_string())
}

/// Blocks written before ids were JSON-encoded carry the bare id
fn parse_id_attr(raw: &str) -> ArticleId {
    serde_json::from_str(raw).unwrap_or_else(|_| ArticleId::parse(raw))
}

fn escape_attr(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('"', "&quot;")
}

fn unescape_attr(raw: &str) -> String {
    raw.replace("&quot;", "\"").replace("&amp;", "&")
}

//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::Value;

use lexllm::adapters::lex_db::{ArticleEntry, SearchHit};
use lexllm::adapters::{LexDbApi, LexDbError, LlmProvider, SearchQuery, TextStream};
use lexllm::core::{keys, EventEmitter, Orchestrator, RunContext, StepOutput, WorkflowStep};
use lexllm::domain::{ArticleId, ConversationMessage, EventKind, LexArticle, StreamEvent};

// ============================================================================
// Model provider
// ============================================================================

/// Replays scripted answers, one per call, and records every prompt
#[derive(Default)]
pub struct ScriptedProvider {
    answers: Mutex<VecDeque<Result<Vec<String>, String>>>,
    calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_deltas(self, deltas: &[&str]) -> Self {
        let deltas = deltas.iter().map(|d| d.to_string()).collect();
        self.answers.lock().unwrap().push_back(Ok(deltas));
        self
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then_deltas(&[text])
    }

    pub fn then_error(self, error: &str) -> Self {
        self.answers.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Vec<ConversationMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate_stream(&self, messages: &[ConversationMessage]) -> Result<TextStream> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let next = self.answers.lock().unwrap().pop_front();
        match next {
            Some(Ok(deltas)) => Ok(stream::iter(deltas.into_iter().map(Ok::<String, anyhow::Error>)).boxed()),
            Some(Err(error)) => anyhow::bail!("{}", error),
            None => anyhow::bail!("no scripted answer left"),
        }
    }
}

// ============================================================================
// Knowledge base
// ============================================================================

/// How the fake knowledge base answers searches
pub enum SearchBehavior {
    Hits(Vec<SearchHit>),
    Unreachable,
    Status(u16),
}

/// In-memory knowledge base
pub struct FakeLexDb {
    behavior: SearchBehavior,
    articles: Vec<ArticleEntry>,
    pub searches: Mutex<Vec<(String, String, SearchQuery)>>,
    pub lookups: Mutex<Vec<Vec<ArticleId>>>,
}

impl FakeLexDb {
    pub fn new(behavior: SearchBehavior) -> Self {
        Self {
            behavior,
            articles: Vec::new(),
            searches: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Article-level hits for `articles`
    pub fn with_hits(articles: &[LexArticle]) -> Self {
        Self::new(SearchBehavior::Hits(articles.iter().map(article_hit).collect()))
    }

    pub fn with_articles(mut self, articles: &[LexArticle]) -> Self {
        self.articles = articles
            .iter()
            .map(|a| ArticleEntry {
                id: a.id.clone(),
                title: a.title.clone(),
                text: a.text.clone(),
                url: a.url.clone(),
            })
            .collect();
        self
    }

    fn search(&self, method: &str, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.searches
            .lock()
            .unwrap()
            .push((method.to_string(), index.to_string(), query.clone()));

        match &self.behavior {
            SearchBehavior::Hits(hits) => Ok(hits.iter().take(query.top_k).cloned().collect()),
            SearchBehavior::Unreachable => Err(LexDbError::Transport("connection refused".to_string())),
            SearchBehavior::Status(status) => Err(LexDbError::Status {
                status: *status,
                body: "index not found".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LexDbApi for FakeLexDb {
    async fn vector_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("vector_search", index, query)
    }

    async fn hybrid_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("hybrid_search", index, query)
    }

    async fn hyde_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("hyde_search", index, query)
    }

    async fn hybrid_hyde_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("hybrid_hyde_search", index, query)
    }

    async fn get_articles(&self, ids: &[ArticleId]) -> Result<Vec<ArticleEntry>, LexDbError> {
        self.lookups.lock().unwrap().push(ids.to_vec());
        Ok(self
            .articles
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }
}

pub fn article_hit(article: &LexArticle) -> SearchHit {
    SearchHit {
        id: article.id.clone(),
        title: article.title.clone(),
        text: article.text.clone(),
        url: Some(article.url.clone()),
        source_article_id: None,
    }
}

pub fn chunk_hit(chunk_id: i64, parent: i64) -> SearchHit {
    SearchHit {
        id: ArticleId::Int(chunk_id),
        title: String::new(),
        text: format!("chunk {}", chunk_id),
        url: None,
        source_article_id: Some(ArticleId::Int(parent)),
    }
}

// ============================================================================
// Articles
// ============================================================================

pub fn rundetaarn() -> LexArticle {
    LexArticle::new(
        1,
        "Rundetårn",
        "Rundetårn er et observatorietårn i København, opført 1637-42.",
        "https://lex.dk/Rundetårn",
    )
}

pub fn christian_4() -> LexArticle {
    LexArticle::new(
        2,
        "Christian 4.",
        "Christian 4. var konge af Danmark og Norge 1588-1648.",
        "https://lex.dk/Christian_4.",
    )
}

pub fn tycho_brahe() -> LexArticle {
    LexArticle::new(
        3,
        "Tycho Brahe",
        "Tycho Brahe var en dansk astronom.",
        "https://lex.dk/Tycho_Brahe",
    )
}

// ============================================================================
// Steps
// ============================================================================

/// Emits `count` text chunks named after the step
pub struct ChunkStep {
    pub name: String,
    pub count: usize,
}

impl ChunkStep {
    pub fn new(name: &str, count: usize) -> Arc<dyn WorkflowStep> {
        Arc::new(Self {
            name: name.to_string(),
            count,
        })
    }
}

#[async_trait]
impl WorkflowStep for ChunkStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut RunContext, emitter: &EventEmitter, out: &mut StepOutput) -> Result<()> {
        for i in 0..self.count {
            out.send(emitter.text_chunk(&format!("{}-{}", self.name, i))).await?;
        }
        Ok(())
    }
}

/// Emits one chunk, then fails
pub struct FailingStep {
    pub name: String,
}

impl FailingStep {
    pub fn new(name: &str) -> Arc<dyn WorkflowStep> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl WorkflowStep for FailingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut RunContext, emitter: &EventEmitter, out: &mut StepOutput) -> Result<()> {
        out.send(emitter.text_chunk("partial")).await?;
        anyhow::bail!("search index unavailable")
    }
}

/// Writes fixed context entries
pub struct WriterStep {
    pub entries: Vec<(&'static str, Value)>,
}

impl WriterStep {
    pub fn new(entries: Vec<(&'static str, Value)>) -> Arc<dyn WorkflowStep> {
        Arc::new(Self { entries })
    }

    /// Writes `final_response`
    pub fn answer(text: &str) -> Arc<dyn WorkflowStep> {
        Self::new(vec![(keys::FINAL_RESPONSE, Value::from(text))])
    }
}

#[async_trait]
impl WorkflowStep for WriterStep {
    fn name(&self) -> &str {
        "Writer"
    }

    async fn run(&self, ctx: &mut RunContext, _emitter: &EventEmitter, _out: &mut StepOutput) -> Result<()> {
        for (key, value) in &self.entries {
            ctx.insert_value(*key, value.clone());
        }
        Ok(())
    }
}

/// Counts how many times it ran
pub struct CountingStep {
    pub runs: Arc<AtomicUsize>,
}

impl CountingStep {
    pub fn new() -> (Arc<dyn WorkflowStep>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (Arc::new(Self { runs: runs.clone() }), runs)
    }
}

#[async_trait]
impl WorkflowStep for CountingStep {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn run(&self, _ctx: &mut RunContext, emitter: &EventEmitter, out: &mut StepOutput) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        out.send(emitter.text_chunk("counted")).await?;
        Ok(())
    }
}

// ============================================================================
// Running
// ============================================================================

/// Drive a run to completion and parse every record
pub async fn run_events(orchestrator: &mut Orchestrator) -> Vec<StreamEvent> {
    let records: Vec<String> = orchestrator.execute().collect().await;
    records
        .iter()
        .map(|record| {
            assert!(record.ends_with('\n'), "record is not newline-terminated: {}", record);
            assert_eq!(record.matches('\n').count(), 1, "record spans several lines: {}", record);
            StreamEvent::from_record(record).unwrap()
        })
        .collect()
}

pub fn kinds(events: &[StreamEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.event).collect()
}

pub fn texts(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.event == EventKind::TextChunk)
        .filter_map(|e| e.data.as_ref().and_then(Value::as_str).map(str::to_string))
        .collect()
}

/// `conversation_history` payload of the last `stream_end`
pub fn final_history(events: &[StreamEvent]) -> Vec<ConversationMessage> {
    let end = events
        .iter()
        .rev()
        .find(|e| e.event == EventKind::StreamEnd)
        .expect("no stream_end record");
    serde_json::from_value(end.data.as_ref().unwrap()["conversation_history"].clone()).unwrap()
}

/// Payload of the single `sources` record
pub fn sources_payload(events: &[StreamEvent]) -> Vec<Value> {
    let sources: Vec<&StreamEvent> = events.iter().filter(|e| e.event == EventKind::Sources).collect();
    assert_eq!(sources.len(), 1, "expected exactly one sources record");
    sources[0].data.as_ref().unwrap().as_array().unwrap().clone()
}

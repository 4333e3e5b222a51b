//! Lex DB knowledge-base adapter.
//!
//! `LexDbApi` is the raw service interface (one call per search endpoint plus
//! a bulk article lookup). `LexDbConnector` sits on top of it and normalizes
//! every result shape into `LexArticle`s.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::domain::{ArticleId, LexArticle};

/// Errors from the knowledge-base service
#[derive(Debug, Error)]
pub enum LexDbError {
    /// The service could not be reached
    #[error("Failed to reach Lex DB: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("Lex DB returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape
    #[error("Failed to decode Lex DB response: {0}")]
    Decode(String),
}

/// Supported search methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Dense vector similarity
    #[default]
    VectorSearch,

    /// Vector + full-text, fused with RRF
    HybridSearch,

    /// Vector search on a hypothetical answer document
    HydeSearch,

    /// Hybrid search on a hypothetical answer document
    HybridHydeSearch,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VectorSearch => "vector_search",
            Self::HybridSearch => "hybrid_search",
            Self::HydeSearch => "hyde_search",
            Self::HybridHydeSearch => "hybrid_hyde_search",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body shared by all search endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub query_text: String,
    pub top_k: usize,

    /// RRF constant for the hybrid methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrf_k: Option<u32>,
}

impl SearchQuery {
    pub fn new(query_text: impl Into<String>, top_k: usize) -> Self {
        Self {
            query_text: query_text.into(),
            top_k,
            rrf_k: None,
        }
    }

    pub fn with_rrf_k(mut self, rrf_k: u32) -> Self {
        self.rrf_k = Some(rrf_k);
        self
    }
}

/// One raw search result row. Article-level endpoints return full articles;
/// chunk-level endpoints return chunks pointing at their parent article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ArticleId,

    #[serde(default, alias = "headword")]
    pub title: String,

    #[serde(default, alias = "chunk_text", alias = "xhtml_md")]
    pub text: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub source_article_id: Option<ArticleId>,
}

/// A full article from the bulk lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleEntry {
    pub id: ArticleId,

    #[serde(alias = "headword")]
    pub title: String,

    #[serde(default, alias = "xhtml_md")]
    pub text: String,

    #[serde(default)]
    pub url: String,
}

impl From<ArticleEntry> for LexArticle {
    fn from(entry: ArticleEntry) -> Self {
        LexArticle {
            id: entry.id,
            title: entry.title,
            text: entry.text,
            url: entry.url,
        }
    }
}

/// Raw knowledge-base service interface
#[async_trait]
pub trait LexDbApi: Send + Sync {
    async fn vector_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError>;

    async fn hybrid_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError>;

    async fn hyde_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError>;

    async fn hybrid_hyde_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, LexDbError>;

    async fn get_articles(&self, ids: &[ArticleId]) -> Result<Vec<ArticleEntry>, LexDbError>;
}

/// HTTP client for the Lex DB service
pub struct LexDbClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SearchRequestBody<'a> {
    vector_index_name: &'a str,
    #[serde(flatten)]
    query: &'a SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    #[serde(default)]
    entries: Vec<ArticleEntry>,
}

impl LexDbClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn search(
        &self,
        endpoint: &str,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, LexDbError> {
        let body = SearchRequestBody {
            vector_index_name: index,
            query,
        };

        let response = self
            .client
            .post(self.api_url(endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| LexDbError::Transport(e.to_string()))?;

        let response: SearchResponse = decode(response).await?;
        Ok(response.results)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, LexDbError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LexDbError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| LexDbError::Decode(e.to_string()))
}

#[async_trait]
impl LexDbApi for LexDbClient {
    async fn vector_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("vector-search", index, query).await
    }

    async fn hybrid_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("hybrid-search", index, query).await
    }

    async fn hyde_search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("hyde-search", index, query).await
    }

    async fn hybrid_hyde_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, LexDbError> {
        self.search("hybrid-hyde-search", index, query).await
    }

    async fn get_articles(&self, ids: &[ArticleId]) -> Result<Vec<ArticleEntry>, LexDbError> {
        let ids = serde_json::to_string(ids).map_err(|e| LexDbError::Decode(e.to_string()))?;

        let response = self
            .client
            .get(self.api_url("articles"))
            .query(&[("ids", ids)])
            .send()
            .await
            .map_err(|e| LexDbError::Transport(e.to_string()))?;

        let response: ArticlesResponse = decode(response).await?;
        Ok(response.entries)
    }
}

/// Normalizing front-end over a `LexDbApi`
#[derive(Clone)]
pub struct LexDbConnector {
    api: Arc<dyn LexDbApi>,
}

impl LexDbConnector {
    pub fn new(api: Arc<dyn LexDbApi>) -> Self {
        Self { api }
    }

    /// Connector over the HTTP client
    pub fn http(base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(LexDbClient::new(base_url)))
    }

    /// Run one search and normalize the results.
    ///
    /// A transport failure is logged and reported as zero documents. Other
    /// errors are returned.
    #[instrument(skip(self, query), fields(top_k = query.top_k))]
    pub async fn search(
        &self,
        index: &str,
        method: SearchMethod,
        query: &SearchQuery,
    ) -> Result<Vec<LexArticle>, LexDbError> {
        let hits = match method {
            SearchMethod::VectorSearch => self.api.vector_search(index, query).await,
            SearchMethod::HybridSearch => self.api.hybrid_search(index, query).await,
            SearchMethod::HydeSearch => self.api.hyde_search(index, query).await,
            SearchMethod::HybridHydeSearch => self.api.hybrid_hyde_search(index, query).await,
        };

        let hits = match hits {
            Err(LexDbError::Transport(e)) => {
                warn!(error = %e, "Knowledge base unreachable, treating as no results");
                return Ok(Vec::new());
            }
            other => other?,
        };

        debug!(hits = hits.len(), "Search returned");
        self.normalize(hits).await
    }

    pub async fn vector_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<LexArticle>, LexDbError> {
        self.search(index, SearchMethod::VectorSearch, query).await
    }

    pub async fn hybrid_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<LexArticle>, LexDbError> {
        self.search(index, SearchMethod::HybridSearch, query).await
    }

    pub async fn hyde_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<LexArticle>, LexDbError> {
        self.search(index, SearchMethod::HydeSearch, query).await
    }

    pub async fn hybrid_hyde_search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<LexArticle>, LexDbError> {
        self.search(index, SearchMethod::HybridHydeSearch, query).await
    }

    /// Article-level hits map directly. Chunk-level hits are resolved to
    /// their parent articles with one bulk lookup, keeping rank order.
    async fn normalize(&self, hits: Vec<SearchHit>) -> Result<Vec<LexArticle>, LexDbError> {
        if !hits.iter().any(|h| h.source_article_id.is_some()) {
            return Ok(hits
                .into_iter()
                .map(|hit| LexArticle {
                    id: hit.id,
                    title: hit.title,
                    text: hit.text,
                    url: hit.url.unwrap_or_default(),
                })
                .collect());
        }

        let mut parent_ids: Vec<ArticleId> = Vec::new();
        for hit in &hits {
            let parent = hit.source_article_id.as_ref().unwrap_or(&hit.id);
            let parent = ArticleId::parse(&parent.to_string());
            if !parent_ids.contains(&parent) {
                parent_ids.push(parent);
            }
        }

        let mut entries = match self.api.get_articles(&parent_ids).await {
            Err(LexDbError::Transport(e)) => {
                warn!(error = %e, "Article lookup unreachable, treating as no results");
                return Ok(Vec::new());
            }
            other => other?,
        };

        for entry in &mut entries {
            entry.id = ArticleId::parse(&entry.id.to_string());
        }
        entries.sort_by_key(|entry| {
            parent_ids
                .iter()
                .position(|id| *id == entry.id)
                .unwrap_or(usize::MAX)
        });

        Ok(entries.into_iter().map(LexArticle::from).collect())
    }
}

//! Retrieved articles and the citation view exposed to clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a knowledge-base article.
///
/// The knowledge base hands out integer ids, but string ids are accepted so
/// other connectors and scripted sources can use their own scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleId {
    Int(i64),
    Str(String),
}

impl ArticleId {
    /// Whether a loosely typed value (e.g. from a classifier's JSON answer)
    /// names this id. `12` and `"12"` both match `ArticleId::Int(12)`.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match (self, value) {
            (Self::Int(id), serde_json::Value::Number(n)) => n.as_i64() == Some(*id),
            (Self::Int(id), serde_json::Value::String(s)) => s.trim().parse::<i64>().ok() == Some(*id),
            (Self::Str(id), serde_json::Value::String(s)) => id == s.trim(),
            (Self::Str(id), serde_json::Value::Number(n)) => *id == n.to_string(),
            _ => false,
        }
    }

    /// Parse an id from text, preferring the integer form
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ArticleId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        Self::Str(id.to_string())
    }
}

/// A retrieved document, normalized regardless of search method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexArticle {
    pub id: ArticleId,
    pub title: String,
    pub text: String,
    pub url: String,
}

impl LexArticle {
    pub fn new(
        id: impl Into<ArticleId>,
        title: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            url: url.into(),
        }
    }

    pub fn to_source(&self) -> Source {
        Source {
            id: self.id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// The part of an article a client needs to display a citation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: ArticleId,
    pub title: String,
    pub url: String,
}

/// Append `incoming` to `existing`, skipping ids already present.
/// Returns the articles that were actually new.
pub fn merge_articles(existing: &mut Vec<LexArticle>, incoming: &[LexArticle]) -> Vec<LexArticle> {
    let mut added = Vec::new();
    for article in incoming {
        if existing.iter().any(|a| a.id == article.id) {
            continue;
        }
        existing.push(article.clone());
        added.push(article.clone());
    }
    added
}

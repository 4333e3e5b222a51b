//! Per-run shared context.
//!
//! A string-keyed map of JSON values handed by reference to each step in
//! turn. There is no schema: step order encodes the data dependencies, and
//! each step documents the keys it reads and writes (see [`keys`]).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::WorkflowRunRequest;

/// Well-known context keys shared between steps and the orchestrator
pub mod keys {
    /// Raw user message of this turn (seeded from the request)
    pub const USER_INPUT: &str = "user_input";
    /// Incoming history (seeded from the request)
    pub const CONVERSATION_HISTORY: &str = "conversation_history";
    /// Caller's conversation id (seeded from the request)
    pub const CONVERSATION_ID: &str = "conversation_id";
    /// `Vec<LexArticle>` written by the knowledge-base search step
    pub const RETRIEVED_DOCS: &str = "retrieved_docs";
    /// Full answer text, read by the orchestrator
    pub const FINAL_RESPONSE: &str = "final_response";
    /// Evolving system prompt, read by the orchestrator
    pub const SYSTEM_PROMPT: &str = "system_prompt";
    /// `Vec<LexArticle>` of every article cited so far
    pub const USED_SOURCES: &str = "used_sources";
    /// User turn as actually sent to the model, preferred over `user_input`
    /// when rebuilding history
    pub const USER_MESSAGE_WITH_SOURCES: &str = "user_message_with_sources";
}

/// Mutable key-value store shared by the steps of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunContext {
    values: Map<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the effective context of a run: caller-supplied entries first,
    /// then the request fields, which win on conflict.
    pub fn seeded(initial: RunContext, request: &WorkflowRunRequest) -> Self {
        let mut context = initial;
        context.insert_value(keys::USER_INPUT, Value::from(request.user_input.as_str()));
        context.insert_value(
            keys::CONVERSATION_ID,
            Value::from(request.conversation_id.as_str()),
        );
        let history = request
            .conversation_history
            .iter()
            .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
            .collect::<Vec<_>>();
        context.insert_value(keys::CONVERSATION_HISTORY, Value::Array(history));
        context
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read a string value; `None` if absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Read and deserialize a value. Absent keys are `Ok(None)`; a value of
    /// the wrong shape is an error.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("Context key '{}' has an unexpected shape", key)),
        }
    }

    /// Serialize and store a value
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize context key '{}'", key))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RunContext {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<Map<String, Value>> for RunContext {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

//! OpenRouter provider.
//!
//! OpenRouter fronts many hosted models behind the OpenAI dialect. Requests
//! pin an ordered list of upstream hosts, and consecutive messages with the
//! same role are merged because some hosted models reject them.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use crate::domain::ConversationMessage;

use super::openai::stream_chat_completion;
use super::{LlmProvider, TextStream};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemma-3-27b-it";
pub const DEFAULT_PROVIDERS: &[&str] = &["nebius/fp8"];

/// Provider for the OpenRouter API
pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    providers: Vec<String>,
    allow_fallbacks: bool,
}

impl OpenRouterProvider {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.to_string(),
            providers: DEFAULT_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            allow_fallbacks: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Upstream hosts to try, in order
    pub fn with_providers(mut self, providers: &[&str], allow_fallbacks: bool) -> Self {
        self.providers = providers.iter().map(|p| p.to_string()).collect();
        self.allow_fallbacks = allow_fallbacks;
        self
    }

    pub(crate) fn request_body(&self, messages: &[ConversationMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": merge_consecutive_messages(messages),
            "stream": true,
            "provider": {
                "order": self.providers,
                "allow_fallbacks": self.allow_fallbacks,
            },
        })
    }
}

/// Join runs of same-role messages with a blank line
pub fn merge_consecutive_messages(messages: &[ConversationMessage]) -> Vec<ConversationMessage> {
    let mut merged: Vec<ConversationMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        match merged.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => merged.push(message.clone()),
        }
    }

    merged
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn generate_stream(&self, messages: &[ConversationMessage]) -> Result<TextStream> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OpenRouter API key is not configured (set OPENROUTER_API_KEY)");
        };

        let body = self.request_body(messages);
        stream_chat_completion(&self.client, &self.base_url, api_key, &body).await
    }
}

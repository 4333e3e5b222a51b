//! OpenAI chat-completions provider.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::domain::ConversationMessage;

use super::sse::content_deltas;
use super::{LlmProvider, TextStream};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Provider for the OpenAI API
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiProvider {
    /// A missing key is only reported once a completion is requested
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub(crate) fn request_body(&self, messages: &[ConversationMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn generate_stream(&self, messages: &[ConversationMessage]) -> Result<TextStream> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OpenAI API key is not configured (set OPENAI_API_KEY)");
        };

        let body = self.request_body(messages);
        stream_chat_completion(&self.client, &self.base_url, api_key, &body).await
    }
}

/// POST a streamed chat completion and decode its content deltas
pub(crate) async fn stream_chat_completion(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &Value,
) -> Result<TextStream> {
    let url = format!("{}/chat/completions", base_url);
    debug!(url = %url, "Requesting chat completion");

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        bail!("Chat completion failed with HTTP {}: {}", status, error_body);
    }

    Ok(content_deltas(response.bytes_stream()))
}

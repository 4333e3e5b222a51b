//! Chat model providers.
//!
//! Every provider speaks the OpenAI chat-completions dialect over HTTP and
//! yields the assistant's text as a stream of content deltas.

pub mod openai;
pub mod openrouter;
pub mod sse;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::domain::ConversationMessage;

pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;

/// Content deltas of one completion, in order
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for chat model providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Model the provider sends requests to
    fn model(&self) -> &str;

    /// Start a streamed completion over `messages`
    async fn generate_stream(&self, messages: &[ConversationMessage]) -> Result<TextStream>;

    /// Complete `messages` and return the whole answer
    async fn generate(&self, messages: &[ConversationMessage]) -> Result<String> {
        let mut stream = self.generate_stream(messages).await?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }
}

//! Language-model seam: one prompt in, one completion out.
//!
//! Correction and extraction both go through [`TextModel`], so tests can
//! substitute a scripted fake without touching the network. Production
//! code uses [`LlmTextModel`], which adapts any `edgequake_llm` provider
//! (Azure OpenAI, OpenAI, Anthropic, Ollama, …).
//!
//! Retry lives in the callers, not here: a correction failure only degrades
//! one page, while extraction retries under its own [`crate::RetryPolicy`].

use crate::error::PipelineError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Optional system message sent before the prompt.
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens,
            temperature: 0.1,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }
}

/// Anything that can turn a prompt into a text completion.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Issue one completion call. No retries.
    async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError>;
}

/// [`TextModel`] backed by an `edgequake_llm` provider.
pub struct LlmTextModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmTextModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Instantiate a named provider with the given model or deployment id.
    ///
    /// Credentials are read from the environment by the provider factory
    /// (for `azure`: the Azure OpenAI endpoint, key, and API version).
    pub fn from_provider_name(provider_name: &str, model: &str) -> Result<Self, PipelineError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            PipelineError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}/{model}")))
    }
}

#[async_trait]
impl TextModel for LlmTextModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError> {
        let start = Instant::now();
        let messages = build_messages(request);
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| PipelineError::LlmApiError {
                message: format!("{e}"),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

fn build_messages(request: &ModelRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(ref system) = request.system {
        messages.push(ChatMessage::system(system.as_str()));
    }
    messages.push(ChatMessage::user(request.prompt.as_str()));
    messages
}

/// Build `CompletionOptions` from the request.
fn build_options(request: &ModelRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_from_request() {
        let req = ModelRequest::new("hi", 800).with_temperature(0.0);
        let opts = build_options(&req);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(800));
    }

    #[test]
    fn messages_include_system_only_when_set() {
        let plain = ModelRequest::new("hi", 10);
        assert_eq!(build_messages(&plain).len(), 1);
        let with_system = plain.with_system("be brief");
        assert_eq!(build_messages(&with_system).len(), 2);
    }
}

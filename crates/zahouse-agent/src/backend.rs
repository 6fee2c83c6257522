use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use zahouse_core::{
    config::{Config, Provider},
    ChatTurn,
};

use crate::{AnthropicBackend, GoogleBackend, GroqBackend};

/// One completion call: a system prompt plus the conversation so far.
/// The last turn in `messages` is the new user message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: &'static str, secs: u64 },
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },
}

/// A hosted chat model.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

/// Build the backend selected by `LLM_PROVIDER`.
pub fn build_backend(config: &Config) -> Arc<dyn LlmBackend> {
    let model = config.provider_model();
    let key = config.provider_api_key().to_string();
    if key.is_empty() {
        warn!(
            provider = config.provider.as_str(),
            "no API key configured, every completion will fail"
        );
    }
    info!(provider = config.provider.as_str(), model = %model, "LLM backend selected");
    match config.provider {
        Provider::Anthropic => {
            Arc::new(AnthropicBackend::new(key, model).with_timeout(config.llm_timeout_s))
        },
        Provider::Groq => Arc::new(GroqBackend::new(key, model).with_timeout(config.llm_timeout_s)),
        Provider::Google => {
            Arc::new(GoogleBackend::new(key, model).with_timeout(config.llm_timeout_s))
        },
    }
}

/// Returned when a provider answers successfully but with no text.
pub const EMPTY_COMPLETION: &str = "No analysis generated.";

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use zahouse_core::Role;

use crate::{
    backend::{CompletionRequest, LlmBackend, ProviderError, EMPTY_COMPLETION},
    http::send_json,
};

const API_BASE: &str = "https://api.groq.com";

/// Llama models on Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqBackend {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    client: reqwest::Client,
}

impl GroqBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: API_BASE.into(),
            timeout_secs: 120,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for GroqBackend {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.system,
            });
        }
        for turn in &request.messages {
            let role = match turn.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(ChatMessage {
                role,
                content: &turn.content,
            });
        }

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        info!(model = %self.model, turns = request.messages.len(), "calling groq chat completions");

        let url = format!(
            "{}/openai/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let http = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .bearer_auth(&self.api_key)
            .json(&body);

        let parsed: ChatResponse = send_json(self.name(), self.timeout_secs, http).await?;
        let output = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| EMPTY_COMPLETION.to_string());

        info!(model = %self.model, output_len = output.len(), "groq response received");
        Ok(output)
    }
}

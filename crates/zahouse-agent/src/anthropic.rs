use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use zahouse_core::Role;

use crate::{
    backend::{CompletionRequest, LlmBackend, ProviderError, EMPTY_COMPLETION},
    http::send_json,
};

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Claude via the Anthropic Messages API.
pub struct AnthropicBackend {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    client: reqwest::Client,
}

impl AnthropicBackend {
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
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let messages = request
            .messages
            .iter()
            .filter_map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => return None,
                };
                Some(Message {
                    role,
                    content: &turn.content,
                })
            })
            .collect();

        let body = MessagesRequest {
            model: &self.model,
            system: &request.system,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        info!(model = %self.model, turns = request.messages.len(), "calling anthropic messages API");

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let http = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let parsed: MessagesResponse = send_json(self.name(), self.timeout_secs, http).await?;
        let output = parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| EMPTY_COMPLETION.to_string());

        info!(model = %self.model, output_len = output.len(), "anthropic response received");
        Ok(output)
    }
}

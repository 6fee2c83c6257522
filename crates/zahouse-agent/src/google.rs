use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use zahouse_core::Role;

use crate::{
    backend::{CompletionRequest, LlmBackend, ProviderError, EMPTY_COMPLETION},
    http::send_json,
};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Gemini via the Generative Language `generateContent` endpoint.
pub struct GoogleBackend {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    client: reqwest::Client,
}

impl GoogleBackend {
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
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmBackend for GoogleBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let contents = request
            .messages
            .iter()
            .filter_map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None,
                };
                Some(Content {
                    role: Some(role),
                    parts: vec![Part {
                        text: &turn.content,
                    }],
                })
            })
            .collect();

        let system_instruction = (!request.system.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: &request.system,
            }],
        });

        let body = GenerateRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        info!(model = %self.model, turns = request.messages.len(), "calling gemini generateContent");

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            urlencoding::encode(&self.api_key)
        );
        let http = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .json(&body);

        let parsed: GenerateResponse = send_json(self.name(), self.timeout_secs, http).await?;
        let output: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        let output = if output.trim().is_empty() {
            EMPTY_COMPLETION.to_string()
        } else {
            output
        };
        info!(model = %self.model, output_len = output.len(), "gemini response received");
        Ok(output)
    }
}

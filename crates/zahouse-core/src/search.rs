use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::Config, types::SearchResult};

const TAVILY_BASE: &str = "https://api.tavily.com";

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Tavily API client for live web search
pub struct TavilyClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: TAVILY_BASE.into(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchService for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            max_results,
            include_answer: false,
        };

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send Tavily search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily API error {}: {}", status, body);
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        info!(results = parsed.results.len(), "web search complete");

        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score,
            })
            .collect())
    }
}

/// No-op search service when no API key is configured
pub struct NoopSearchService;

#[async_trait]
impl SearchService for NoopSearchService {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchResult>> {
        warn!("search requested but TAVILY_API_KEY is not configured");
        Ok(vec![])
    }
}

pub fn search_from_config(config: &Config) -> Arc<dyn SearchService> {
    if !config.search_enabled() {
        return Arc::new(NoopSearchService);
    }
    match TavilyClient::new(config.tavily_api_key.clone()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!("web search disabled: {e:#}");
            Arc::new(NoopSearchService)
        }
    }
}

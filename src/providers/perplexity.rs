//! Perplexity search provider
//!
//! Returns one synthesized answer with citation URLs. The first citation
//! carries the answer; the others are listed as secondary sources.

use super::kind::ProviderKind;
use super::traits::*;
use crate::network::HttpClient;
use crate::results::{QueryResponse, SearchResult};
use crate::search::Pacing;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const DEFAULT_MODEL: &str = "sonar-pro";
const SYSTEM_PROMPT: &str = "Search the web and provide factual information with sources.";
const FALLBACK_CITATION: &str = "https://perplexity.ai";
const SECONDARY_CONTENT: &str = "See primary source for full content";

/// Perplexity chat-completions search provider
pub struct Perplexity {
    api_url: String,
    api_key: String,
    model: String,
    pacing: Pacing,
    timeout: f64,
}

impl Perplexity {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            pacing: ProviderKind::Perplexity.default_pacing(),
            timeout: 60.0,
        }
    }

    /// Point the provider at another endpoint
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP request for one query
    pub fn request(&self, query: &str) -> ProviderRequest {
        ProviderRequest::post(&self.api_url)
            .timeout_secs(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": query},
                ]
            }))
    }

    /// Parse the HTTP response into a canonical response
    pub fn response(&self, query: &str, response: ProviderResponse) -> Result<QueryResponse> {
        response.ensure_success()?;
        let body: CompletionResponse = response.json()?;

        let answer = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Malformed response: no choices returned"))?;

        let citations = match body.citations {
            Some(citations) if !citations.is_empty() => citations,
            _ => vec![FALLBACK_CITATION.to_string()],
        };

        let results = citations
            .into_iter()
            .enumerate()
            .map(|(i, url)| {
                let title = format!("Perplexity Search, Source {}", i + 1);
                if i == 0 {
                    SearchResult::new(url, title)
                        .with_content(answer.clone())
                        .with_raw_content(Some(answer.clone()))
                        .with_score(1.0)
                } else {
                    SearchResult::new(url, title)
                        .with_content(SECONDARY_CONTENT)
                        .with_score(0.5)
                }
            })
            .collect();

        Ok(QueryResponse::with_results(query, results))
    }
}

#[async_trait]
impl SearchProvider for Perplexity {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Perplexity
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    fn timeout(&self) -> f64 {
        self.timeout
    }

    async fn search(&self, client: &HttpClient, query: &str) -> Result<QueryResponse> {
        let response = client.execute(self.request(query)).await?;
        self.response(query, response)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: String,
}

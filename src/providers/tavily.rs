//! Tavily web search provider
//!
//! Generous rate limits, so every query of a batch is sent at once.

use super::kind::ProviderKind;
use super::traits::*;
use crate::network::HttpClient;
use crate::results::{QueryResponse, SearchResult};
use crate::search::Pacing;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_URL: &str = "https://api.tavily.com/search";

/// Tavily search provider
pub struct Tavily {
    api_url: String,
    api_key: String,
    max_results: u32,
    topic: String,
    timeout: f64,
}

impl Tavily {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            max_results: 5,
            topic: "general".to_string(),
            timeout: 30.0,
        }
    }

    /// Point the provider at another endpoint
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
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
            .json(json!({
                "query": query,
                "max_results": self.max_results,
                "include_raw_content": true,
                "topic": self.topic,
            }))
    }

    /// Parse the HTTP response into a canonical response
    pub fn response(&self, query: &str, response: ProviderResponse) -> Result<QueryResponse> {
        response.ensure_success()?;
        let body: TavilyResponse = response.json()?;

        let mut normalized = QueryResponse::new(query);
        normalized.follow_up_questions = body.follow_up_questions;
        normalized.answer = body.answer;
        for image in body.images {
            normalized.add_image(image.into_url());
        }
        normalized.results = body
            .results
            .into_iter()
            .map(|r| {
                SearchResult::new(r.url, r.title)
                    .with_content(r.content)
                    .with_score(r.score)
                    .with_raw_content(r.raw_content.filter(|raw| !raw.is_empty()))
            })
            .collect();

        Ok(normalized)
    }
}

#[async_trait]
impl SearchProvider for Tavily {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tavily
    }

    fn pacing(&self) -> Pacing {
        ProviderKind::Tavily.default_pacing()
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
struct TavilyResponse {
    #[serde(default)]
    follow_up_questions: Option<Vec<String>>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    images: Vec<TavilyImage>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    raw_content: Option<String>,
}

/// Images come back as bare URLs, or as objects when descriptions are on
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TavilyImage {
    Url(String),
    Described { url: String },
}

impl TavilyImage {
    fn into_url(self) -> String {
        match self {
            TavilyImage::Url(url) | TavilyImage::Described { url } => url,
        }
    }
}

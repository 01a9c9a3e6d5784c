//! Exa search provider
//!
//! Queried one request at a time to stay under the API's 5 requests per
//! second limit. Supports domain filters, subpages and page images.

use super::kind::ProviderKind;
use super::traits::*;
use crate::error::SearchError;
use crate::network::HttpClient;
use crate::results::{QueryResponse, SearchResult};
use crate::search::Pacing;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

const DEFAULT_API_URL: &str = "https://api.exa.ai/search";

/// Options accepted from the caller's configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExaParams {
    /// Cap on raw text per result; unlimited when absent
    pub max_characters: Option<u32>,
    /// Results per query
    pub num_results: u32,
    /// Only return results from these domains
    pub include_domains: Option<Vec<String>>,
    /// Never return results from these domains
    pub exclude_domains: Option<Vec<String>>,
    /// Subpages to crawl per result
    pub subpages: Option<u32>,
}

impl Default for ExaParams {
    fn default() -> Self {
        Self {
            max_characters: None,
            num_results: 5,
            include_domains: None,
            exclude_domains: None,
            subpages: None,
        }
    }
}

impl ExaParams {
    /// Reject include and exclude filters given together
    pub fn validate(&self) -> Result<(), SearchError> {
        let non_empty = |d: &Option<Vec<String>>| d.as_ref().is_some_and(|d| !d.is_empty());
        if non_empty(&self.include_domains) && non_empty(&self.exclude_domains) {
            return Err(SearchError::invalid_params(
                ProviderKind::Exa,
                "Cannot specify both include_domains and exclude_domains",
            ));
        }
        Ok(())
    }
}

/// Exa search provider
pub struct Exa {
    api_url: String,
    api_key: String,
    params: ExaParams,
    pacing: Pacing,
    timeout: f64,
}

impl Exa {
    /// Create the provider; fails on conflicting domain filters
    pub fn new(api_key: impl Into<String>, params: ExaParams) -> Result<Self, SearchError> {
        params.validate()?;
        Ok(Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            params,
            pacing: ProviderKind::Exa.default_pacing(),
            timeout: 30.0,
        })
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
        let text = match self.params.max_characters {
            Some(max) => json!({ "maxCharacters": max }),
            None => json!(true),
        };
        let mut contents = json!({ "text": text, "summary": true });
        if let Some(subpages) = self.params.subpages {
            contents["subpages"] = json!(subpages);
        }

        let mut body = json!({
            "query": query,
            "numResults": self.params.num_results,
            "contents": contents,
        });

        match (&self.params.include_domains, &self.params.exclude_domains) {
            (Some(include), _) if !include.is_empty() => body["includeDomains"] = json!(include),
            (_, Some(exclude)) if !exclude.is_empty() => body["excludeDomains"] = json!(exclude),
            _ => {}
        }

        ProviderRequest::post(&self.api_url)
            .timeout_secs(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
    }

    /// Parse the HTTP response into a canonical response
    pub fn response(&self, query: &str, response: ProviderResponse) -> Result<QueryResponse> {
        response.ensure_success()?;
        let body: ExaResponse = response.json()?;

        let mut normalized = QueryResponse::new(query);
        let mut seen_urls = HashSet::new();

        for page in &body.results {
            if seen_urls.insert(page.url.clone()) {
                normalized.results.push(page.to_result());
            }
        }

        if self.params.subpages.is_some() {
            for subpage in body.results.iter().flat_map(|page| page.subpages.iter()) {
                if seen_urls.insert(subpage.url.clone()) {
                    normalized.results.push(subpage.to_result());
                }
            }
        }

        // Images from top-level results only
        for page in &body.results {
            if let Some(image) = &page.image {
                normalized.add_image(image.clone());
            }
        }

        Ok(normalized)
    }
}

#[async_trait]
impl SearchProvider for Exa {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Exa
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
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaPage>,
}

#[derive(Debug, Deserialize)]
struct ExaPage {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    subpages: Vec<ExaPage>,
}

impl ExaPage {
    /// Summary and text are combined into the snippet; text alone is the
    /// raw content
    fn to_result(&self) -> SearchResult {
        let text = self.text.clone().unwrap_or_default();
        let content = match self.summary.as_deref() {
            Some(summary) if !summary.is_empty() && !text.is_empty() => {
                format!("{}\n\n{}", summary, text)
            }
            Some(summary) if !summary.is_empty() => summary.to_string(),
            _ => text.clone(),
        };

        SearchResult::new(self.url.clone(), self.title.clone().unwrap_or_default())
            .with_content(content)
            .with_score(self.score.unwrap_or(0.0))
            .with_raw_content(Some(text).filter(|t| !t.is_empty()))
    }
}

//! Provider traits and types

use super::kind::ProviderKind;
use crate::network::HttpClient;
use crate::results::QueryResponse;
use crate::search::Pacing;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP request to be made by a provider
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters
    pub params: HashMap<String, String>,
    /// JSON body
    pub body: Option<serde_json::Value>,
    /// Overrides the client's default timeout
    pub timeout: Option<Duration>,
}

impl ProviderRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            params: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter when a value is present
    pub fn param_opt(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.param(key, value),
            _ => self,
        }
    }

    /// Add JSON body
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.body = Some(data);
        self
    }

    /// Time limit in seconds; invalid values keep the client default
    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout = Duration::try_from_secs_f64(seconds).ok();
        self
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP response from a provider request
#[derive(Debug)]
pub struct ProviderResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub text: String,
}

impl ProviderResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_str(&self.text).map_err(|e| anyhow!("Malformed response: {}", e))
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Turn a non-2xx response into an error carrying the status line
    pub fn ensure_success(&self) -> anyhow::Result<()> {
        if self.is_success() {
            return Ok(());
        }
        let reason = reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        let excerpt: String = self.text.chars().take(200).collect();
        let excerpt = excerpt.trim();
        if excerpt.is_empty() {
            Err(anyhow!("HTTP error: {} {}", self.status, reason))
        } else {
            Err(anyhow!("HTTP error: {} {}: {}", self.status, reason, excerpt))
        }
    }
}

/// A provider adapter: turns one query into one canonical response.
///
/// Batching, pacing, timeouts and failure isolation are handled by the
/// executor according to `pacing()`; an adapter only deals with a single
/// query and may fail freely.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Provider name
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Scheduling policy for a batch
    fn pacing(&self) -> Pacing;

    /// Per-query timeout in seconds
    fn timeout(&self) -> f64 {
        30.0
    }

    /// Run one query
    async fn search(&self, client: &HttpClient, query: &str) -> anyhow::Result<QueryResponse>;
}

//! Batch execution and pacing

use super::models::BatchRequest;
use super::pacing::{is_rate_limit_error, Pacing};
use super::params::{filter_params, ConfigMap};
use crate::config::ProvidersSettings;
use crate::error::SearchError;
use crate::metrics::Metrics;
use crate::network::HttpClient;
use crate::providers::{ProviderKind, ProviderLoader, SearchProvider};
use crate::results::QueryResponse;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Search executor that runs batches of queries against one provider
pub struct Search {
    /// HTTP client for making requests
    client: HttpClient,
    /// Provider keys, endpoints and switches
    providers: ProvidersSettings,
    /// Upper bound on any per-query timeout
    max_timeout: Duration,
    /// Shared metrics
    metrics: Arc<Metrics>,
}

impl Search {
    /// Create a new search executor
    pub fn new(client: HttpClient, providers: ProvidersSettings) -> Self {
        Self {
            client,
            providers,
            max_timeout: Duration::from_secs(120),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Set maximum timeout
    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = timeout;
        self
    }

    /// Record into an existing metrics collector
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn providers(&self) -> &ProvidersSettings {
        &self.providers
    }

    /// Execute a batch.
    ///
    /// Caller errors are returned before any query is sent; after that every
    /// query yields exactly one response, in input order.
    pub async fn execute(&self, batch: &BatchRequest) -> Result<Vec<QueryResponse>, SearchError> {
        let params = filter_params(batch.provider, batch.config.as_ref());
        let provider = ProviderLoader::create(batch.provider, &params, &self.providers)?;
        Ok(self.run_batch(provider.as_ref(), &batch.queries).await)
    }

    /// Execute a batch for a provider given by name or alias
    pub async fn execute_named(
        &self,
        provider: &str,
        config: Option<&ConfigMap>,
        queries: &[String],
    ) -> Result<Vec<QueryResponse>, SearchError> {
        let kind: ProviderKind = provider
            .parse()
            .map_err(|_| SearchError::UnknownProvider(provider.to_string()))?;

        let batch = BatchRequest {
            provider: kind,
            config: config.cloned(),
            queries: queries.to_vec(),
        };
        self.execute(&batch).await
    }

    /// Run every query through `provider` according to its pacing
    pub async fn run_batch(
        &self,
        provider: &dyn SearchProvider,
        queries: &[String],
    ) -> Vec<QueryResponse> {
        let pacing = provider.pacing();
        let start = Instant::now();
        self.metrics.inc_batch();

        info!(
            "Running {} queries on {} ({})",
            queries.len(),
            provider.name(),
            pacing.describe()
        );

        let responses = match pacing {
            Pacing::Concurrent => {
                join_all(queries.iter().map(|query| self.search_query(provider, query))).await
            }
            Pacing::Fixed {
                interval,
                rate_limit_pause,
            } => {
                let mut responses = Vec::with_capacity(queries.len());
                for (i, query) in queries.iter().enumerate() {
                    if i > 0 {
                        sleep(interval).await;
                    }

                    let response = self.search_query(provider, query).await;
                    let rate_limited = response.error.as_deref().is_some_and(is_rate_limit_error);
                    responses.push(response);

                    if rate_limited && i + 1 < queries.len() {
                        warn!(
                            "{} rate limited, pausing {:.1}s",
                            provider.name(),
                            rate_limit_pause.as_secs_f64()
                        );
                        sleep(rate_limit_pause).await;
                    }
                }
                responses
            }
            Pacing::Adaptive(mut delay) => {
                let mut responses = Vec::with_capacity(queries.len());
                for (i, query) in queries.iter().enumerate() {
                    if i > 0 {
                        debug!("Waiting {:.2}s before next query", delay.seconds());
                        sleep(delay.duration()).await;
                    }

                    let response = self.search_query(provider, query).await;
                    if !response.is_success() {
                        delay.on_failure();
                    } else if response.has_results() {
                        delay.on_success();
                    }
                    responses.push(response);
                }
                responses
            }
        };

        let failed = responses.iter().filter(|r| !r.is_success()).count();
        info!(
            "Finished {} queries on {} in {:?} ({} failed)",
            responses.len(),
            provider.name(),
            start.elapsed(),
            failed
        );

        responses
    }

    /// Run one query under its timeout, converting any failure into an
    /// error-carrying response
    pub async fn search_query(&self, provider: &dyn SearchProvider, query: &str) -> QueryResponse {
        let name = provider.name();
        let limit = Duration::try_from_secs_f64(
            provider.timeout().min(self.max_timeout.as_secs_f64()),
        )
        .unwrap_or(self.max_timeout);

        debug!("Searching {} for '{}' with timeout {:?}", name, query, limit);
        self.metrics.record_query(name);

        let start = Instant::now();
        let outcome = timeout(limit, provider.search(&self.client, query)).await;
        let elapsed = start.elapsed();
        self.metrics
            .record_response_time(name, elapsed.as_millis() as u64);

        match outcome {
            Ok(Ok(response)) => {
                self.metrics.record_success(name);
                debug!(
                    "{} returned {} results for '{}' in {:?}",
                    name,
                    response.results.len(),
                    query,
                    elapsed
                );
                response
            }
            Ok(Err(e)) => {
                self.metrics.record_error(name);
                warn!("Query '{}' failed on {}: {:#}", query, name, e);
                QueryResponse::failed(query, format!("{:#}", e))
            }
            Err(_) => {
                self.metrics.record_error(name);
                warn!("Timeout for query '{}' on {}", query, name);
                QueryResponse::failed(
                    query,
                    format!("Timed out after {:.1}s", limit.as_secs_f64()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::exa::{Exa, ExaParams};
    use crate::providers::perplexity::Perplexity;
    use crate::providers::tavily::Tavily;
    use crate::results::SearchResult;
    use crate::search::AdaptiveDelay;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn queries(items: &[&str]) -> Vec<String> {
        items.iter().map(|q| q.to_string()).collect()
    }

    fn search() -> Search {
        Search::new(HttpClient::new().unwrap(), ProvidersSettings::default())
    }

    async fn failing_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
            .mount(&server)
            .await;
        server
    }

    fn assert_positional(responses: &[QueryResponse], expected: &[String]) {
        assert_eq!(responses.len(), expected.len());
        for (response, query) in responses.iter().zip(expected) {
            assert_eq!(&response.query, query);
        }
    }

    /// Provider whose outcome is decided by the query text
    struct Scripted {
        pacing: Pacing,
        timeout: f64,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(pacing: Pacing) -> Self {
            Self {
                pacing,
                timeout: 5.0,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for Scripted {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Pubmed
        }

        fn pacing(&self) -> Pacing {
            self.pacing
        }

        fn timeout(&self) -> f64 {
            self.timeout
        }

        async fn search(&self, _client: &HttpClient, query: &str) -> anyhow::Result<QueryResponse> {
            self.seen.lock().unwrap().push(query.to_string());
            if query.starts_with("fail") {
                return Err(anyhow!("HTTP error: 503 Service Unavailable"));
            }
            if query.starts_with("slow") {
                sleep(Duration::from_secs(2)).await;
            }
            if query.starts_with("empty") {
                return Ok(QueryResponse::new(query));
            }
            Ok(QueryResponse::with_results(
                query,
                vec![SearchResult::new(format!("https://example.org/{}", query), query)],
            ))
        }
    }

    #[tokio::test]
    async fn test_concurrent_batch_keeps_positions_when_all_fail() {
        let server = failing_server(500).await;
        let tavily = Tavily::new("key").with_api_url(server.uri());
        let batch = queries(&["one", "two", "three"]);

        let responses = search().run_batch(&tavily, &batch).await;

        assert_positional(&responses, &batch);
        for response in &responses {
            assert!(response.results.is_empty());
            assert!(response.error.as_deref().unwrap().contains("500"));
        }
    }

    #[tokio::test]
    async fn test_fixed_batch_keeps_positions_when_all_fail() {
        let server = failing_server(500).await;
        let exa = Exa::new("key", ExaParams::default())
            .unwrap()
            .with_api_url(server.uri())
            .with_pacing(Pacing::fixed(0.01, 0.01));
        let batch = queries(&["a", "b"]);

        let responses = search().run_batch(&exa, &batch).await;

        assert_positional(&responses, &batch);
        assert!(responses.iter().all(|r| !r.is_success()));
    }

    #[tokio::test]
    async fn test_adaptive_batch_keeps_positions() {
        let provider = Scripted::new(Pacing::Adaptive(AdaptiveDelay::new(0.01, 0.005, 0.05)));
        let batch = queries(&["ok", "fail", "empty", "ok again"]);

        let responses = search().run_batch(&provider, &batch).await;

        assert_positional(&responses, &batch);
        assert!(responses[0].has_results());
        assert!(!responses[1].is_success());
        assert!(responses[2].is_success() && !responses[2].has_results());
        assert!(responses[3].has_results());
        assert_eq!(*provider.seen.lock().unwrap(), batch);
    }

    #[tokio::test]
    async fn test_rate_limit_adds_pause() {
        let server = failing_server(429).await;
        let perplexity = Perplexity::new("key")
            .with_api_url(server.uri())
            .with_pacing(Pacing::fixed(0.0, 0.3));
        let batch = queries(&["first", "second"]);

        let start = Instant::now();
        let responses = search().run_batch(&perplexity, &batch).await;

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(responses
            .iter()
            .all(|r| is_rate_limit_error(r.error.as_deref().unwrap())));
    }

    #[tokio::test]
    async fn test_query_timeout_becomes_error() {
        let mut provider = Scripted::new(Pacing::Concurrent);
        provider.timeout = 0.05;
        let batch = queries(&["slow", "fast"]);

        let responses = search().run_batch(&provider, &batch).await;

        assert_positional(&responses, &batch);
        assert!(responses[0].error.as_deref().unwrap().starts_with("Timed out"));
        assert!(responses[1].has_results());
    }

    #[tokio::test]
    async fn test_timeout_capped_by_max() {
        let provider = Scripted::new(Pacing::Concurrent);
        let search = search().with_max_timeout(Duration::from_millis(50));

        let response = search.search_query(&provider, "slow").await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let err = search()
            .execute_named("bing", None, &queries(&["q"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::UnknownProvider(name) if name == "bing"));
    }

    #[tokio::test]
    async fn test_caller_errors_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut providers = ProvidersSettings::default();
        providers.exa.api_key = Some("key".to_string());
        providers.exa.base_url = Some(server.uri());
        let search = Search::new(HttpClient::new().unwrap(), providers);

        let config = json!({"include_domains": ["a.org"], "exclude_domains": ["b.org"]});
        let err = search
            .execute_named("exa", config.as_object(), &queries(&["q"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidParams { .. }));

        let err = search
            .execute(&BatchRequest::new(ProviderKind::Tavily).query("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::MissingCredentials(ProviderKind::Tavily)));
    }

    #[tokio::test]
    async fn test_paced_web_scores() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Carbon pricing expanded."}}],
                "citations": ["https://one.org", "https://two.org", "https://three.org"]
            })))
            .mount(&server)
            .await;

        let mut providers = ProvidersSettings::default();
        providers.perplexity.api_key = Some("key".to_string());
        providers.perplexity.base_url = Some(server.uri());
        let search = Search::new(HttpClient::new().unwrap(), providers);

        let responses = search
            .execute_named("paced-web", None, &queries(&["climate policy 2024"]))
            .await
            .unwrap();

        let results = &responses[0].results;
        assert_eq!(results[0].score, 1.0);
        assert!(results[0].raw_content.is_some());
        for secondary in &results[1..] {
            assert_eq!(secondary.score, 0.5);
            assert!(secondary.raw_content.is_none());
        }
    }

    #[tokio::test]
    async fn test_execute_through_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "T", "url": "https://t.org", "content": "c", "score": 0.5}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let mut providers = ProvidersSettings::default();
        providers.tavily.api_key = Some("key".to_string());
        providers.tavily.base_url = Some(server.uri());
        let search = Search::new(HttpClient::new().unwrap(), providers);

        let responses = search
            .execute_named("concurrent-web", None, &queries(&["x", "y"]))
            .await
            .unwrap();

        assert_positional(&responses, &queries(&["x", "y"]));
        assert!(responses.iter().all(|r| r.has_results()));
        assert_eq!(search.metrics().get_total_batches(), 1);
        assert_eq!(search.metrics().get_provider_stats()["tavily"].queries, 2);
    }
}

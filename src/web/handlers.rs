//! HTTP request handlers

use super::state::AppState;
use crate::error::SearchError;
use crate::metrics::ProviderStats;
use crate::providers::ProviderKind;
use crate::results::{deduplicate_and_format_sources, QueryResponse};
use crate::search::ConfigMap;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of a batch search request
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Provider name or alias
    pub provider: String,
    /// Provider options; unsupported keys are ignored
    #[serde(default)]
    pub config: Option<ConfigMap>,
    /// Queries to run, answered in order
    pub queries: Vec<String>,
    /// Token budget per source in the rendered report
    pub max_tokens_per_source: Option<usize>,
    /// Whether the report includes full source text
    pub include_raw_content: Option<bool>,
}

/// Batch search results plus the rendered source report
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub provider: ProviderKind,
    pub responses: Vec<QueryResponse>,
    pub sources: String,
}

/// Description of one provider for `/providers`
#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub name: ProviderKind,
    pub enabled: bool,
    pub requires_api_key: bool,
    pub accepted_params: &'static [&'static str],
    pub pacing: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_batches: u64,
    pub providers: HashMap<String, ProviderStats>,
}

/// Caller errors, reported as 400 with an `error` message
#[derive(Debug)]
pub struct ApiError(SearchError);

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("Rejected search request: {}", self.0);
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Batch search handler
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let provider: ProviderKind = request
        .provider
        .parse()
        .map_err(|_| SearchError::UnknownProvider(request.provider.clone()))?;

    let responses = state
        .search
        .execute_named(provider.as_str(), request.config.as_ref(), &request.queries)
        .await?;

    let report = &state.settings.report;
    let sources = deduplicate_and_format_sources(
        &responses,
        request
            .max_tokens_per_source
            .unwrap_or(report.max_tokens_per_source),
        request
            .include_raw_content
            .unwrap_or(report.include_raw_content),
    );

    Ok(Json(SearchResponse {
        provider,
        responses,
        sources,
    }))
}

/// Provider listing handler
pub async fn providers(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.search.providers();
    let providers: Vec<ProviderInfo> = ProviderKind::all()
        .iter()
        .map(|kind| ProviderInfo {
            name: *kind,
            enabled: !settings.get(*kind).disabled,
            requires_api_key: kind.requires_api_key(),
            accepted_params: kind.accepted_params(),
            pacing: kind.default_pacing().describe(),
        })
        .collect();

    Json(providers)
}

/// Stats handler
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.search.metrics();
    Json(StatsResponse {
        total_batches: metrics.get_total_batches(),
        providers: metrics.get_provider_stats(),
    })
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

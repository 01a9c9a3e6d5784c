//! Provider loader for building adapters from settings and caller config

use super::arxiv::{Arxiv, ArxivParams};
use super::exa::{Exa, ExaParams};
use super::kind::ProviderKind;
use super::perplexity::Perplexity;
use super::pubmed::{Pubmed, PubmedParams};
use super::tavily::Tavily;
use super::traits::SearchProvider;
use crate::config::{ProviderSettings, ProvidersSettings};
use crate::error::SearchError;
use crate::search::ConfigMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Builds one adapter per batch from settings and filtered parameters
pub struct ProviderLoader;

impl ProviderLoader {
    /// Create the adapter for `kind`.
    ///
    /// `params` must already be filtered to the provider's accepted keys.
    /// Every caller error is raised here, before any network call.
    pub fn create(
        kind: ProviderKind,
        params: &ConfigMap,
        providers: &ProvidersSettings,
    ) -> Result<Arc<dyn SearchProvider>, SearchError> {
        let settings = providers.get(kind);
        if settings.disabled {
            return Err(SearchError::Disabled(kind));
        }

        let api_key = settings.api_key.clone().filter(|key| !key.is_empty());
        if kind.requires_api_key() && api_key.is_none() {
            return Err(SearchError::MissingCredentials(kind));
        }
        let api_key = api_key.unwrap_or_default();
        let base = settings.base_url.as_deref().map(|b| b.trim_end_matches('/'));
        let timeout = settings.timeout;

        debug!("Creating provider {} with {} params", kind, params.len());

        let provider: Arc<dyn SearchProvider> = match kind {
            ProviderKind::Tavily => {
                let mut tavily = Tavily::new(api_key);
                if let Some(base) = base {
                    tavily = tavily.with_api_url(format!("{}/search", base));
                }
                if let Some(timeout) = timeout {
                    tavily = tavily.with_timeout(timeout);
                }
                Arc::new(tavily)
            }
            ProviderKind::Exa => {
                let mut exa = Exa::new(api_key, parse_params(kind, params)?)?;
                if let Some(base) = base {
                    exa = exa.with_api_url(format!("{}/search", base));
                }
                if let Some(timeout) = timeout {
                    exa = exa.with_timeout(timeout);
                }
                Arc::new(exa)
            }
            ProviderKind::Perplexity => {
                let mut perplexity = Perplexity::new(api_key);
                if let Some(base) = base {
                    perplexity = perplexity.with_api_url(format!("{}/chat/completions", base));
                }
                if let Some(timeout) = timeout {
                    perplexity = perplexity.with_timeout(timeout);
                }
                Arc::new(perplexity)
            }
            ProviderKind::Arxiv => {
                let mut arxiv = Arxiv::new(parse_params::<ArxivParams>(kind, params)?);
                if let Some(base) = base {
                    arxiv = arxiv.with_api_url(base);
                }
                if let Some(timeout) = timeout {
                    arxiv = arxiv.with_timeout(timeout);
                }
                Arc::new(arxiv)
            }
            ProviderKind::Pubmed => Arc::new(Self::pubmed(kind, params, settings, api_key)?),
        };

        Ok(provider)
    }

    fn pubmed(
        kind: ProviderKind,
        params: &ConfigMap,
        settings: &ProviderSettings,
        api_key: String,
    ) -> Result<Pubmed, SearchError> {
        let mut params: PubmedParams = parse_params(kind, params)?;
        if params.api_key.as_deref().map_or(true, str::is_empty) && !api_key.is_empty() {
            params.api_key = Some(api_key);
        }

        let mut pubmed = Pubmed::new(params);
        if let Some(base) = &settings.base_url {
            pubmed = pubmed.with_api_url(base.as_str());
        }
        if let Some(timeout) = settings.timeout {
            pubmed = pubmed.with_timeout(timeout);
        }
        Ok(pubmed)
    }
}

/// Deserialize filtered parameters into a provider's typed options
fn parse_params<T: DeserializeOwned>(
    kind: ProviderKind,
    params: &ConfigMap,
) -> Result<T, SearchError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| SearchError::invalid_params(kind, e.to_string()))
}

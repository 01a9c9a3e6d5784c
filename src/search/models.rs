//! Batch request data models

use super::params::ConfigMap;
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};

/// A batch of queries for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Provider to query
    pub provider: ProviderKind,
    /// Caller configuration; keys the provider does not accept are dropped
    #[serde(default)]
    pub config: Option<ConfigMap>,
    /// Queries, answered in this order
    pub queries: Vec<String>,
}

impl BatchRequest {
    /// Create a batch without configuration
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            config: None,
            queries: Vec::new(),
        }
    }

    /// Add a query to the batch
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.queries.push(query.into());
        self
    }
}

//! Caller-facing error type
//!
//! Only configuration and request-shape problems surface as a `SearchError`.
//! Failures of individual queries are recorded on their `QueryResponse`
//! instead and never abort a batch.

use crate::providers::ProviderKind;
use thiserror::Error;

/// Errors raised before a batch starts; no network call has been made.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Unknown search provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid parameters for {provider}: {message}")]
    InvalidParams {
        provider: ProviderKind,
        message: String,
    },

    #[error("Missing API key for {0}")]
    MissingCredentials(ProviderKind),

    #[error("Provider {0} is disabled")]
    Disabled(ProviderKind),
}

impl SearchError {
    pub fn invalid_params(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            provider,
            message: message.into(),
        }
    }
}

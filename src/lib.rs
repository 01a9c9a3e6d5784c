//! DeepSearch-RS: multi-provider research search aggregation
//!
//! Runs batches of queries against one web, academic or biomedical search
//! provider, normalizes every provider's answer into one result schema, and
//! renders deduplicated results as a text source report.

pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod providers;
pub mod results;
pub mod search;
pub mod web;

pub use config::Settings;
pub use error::SearchError;
pub use providers::{ProviderKind, SearchProvider};
pub use results::{deduplicate_and_format_sources, QueryResponse, SearchResult};
pub use search::{get_search_params, BatchRequest, Search};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

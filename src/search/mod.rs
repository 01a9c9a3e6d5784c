//! Search orchestration module
//!
//! Runs batches of queries against one provider, pacing them the way the
//! provider requires and isolating per-query failures.

mod executor;
mod models;
mod pacing;
mod params;

pub use executor::Search;
pub use models::*;
pub use pacing::{is_rate_limit_error, AdaptiveDelay, Pacing};
pub use params::{filter_params, get_search_params, ConfigMap};

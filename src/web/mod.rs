//! Web server module
//!
//! Provides the JSON HTTP API for DeepSearch-RS.

mod handlers;
mod routes;
mod state;

pub use handlers::{SearchRequest, SearchResponse};
pub use routes::create_router;
pub use state::AppState;

//! Search provider module
//!
//! Defines the `SearchProvider` trait, the closed set of providers and one
//! adapter per provider.

mod kind;
mod loader;
mod traits;

// Provider implementations
pub mod arxiv;
pub mod exa;
pub mod perplexity;
pub mod pubmed;
pub mod tavily;

pub use kind::ProviderKind;
pub use loader::ProviderLoader;
pub use traits::*;

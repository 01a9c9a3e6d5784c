//! Closed set of supported providers

use crate::search::{AdaptiveDelay, Pacing};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every search provider the dispatcher knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ProviderKind {
    /// General web search, queried concurrently
    Tavily,
    /// Web search with rate pacing and domain filters
    Exa,
    /// LLM-mediated search returning an answer plus citations
    Perplexity,
    /// Scholarly metadata from arXiv
    Arxiv,
    /// Biomedical literature from PubMed
    Pubmed,
}

impl ProviderKind {
    pub fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::Tavily,
            ProviderKind::Exa,
            ProviderKind::Perplexity,
            ProviderKind::Arxiv,
            ProviderKind::Pubmed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Tavily => "tavily",
            ProviderKind::Exa => "exa",
            ProviderKind::Perplexity => "perplexity",
            ProviderKind::Arxiv => "arxiv",
            ProviderKind::Pubmed => "pubmed",
        }
    }

    /// Configuration keys this provider accepts; everything else is dropped
    pub fn accepted_params(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Tavily | ProviderKind::Perplexity => &[],
            ProviderKind::Exa => &[
                "max_characters",
                "num_results",
                "include_domains",
                "exclude_domains",
                "subpages",
            ],
            ProviderKind::Arxiv => &[
                "load_max_docs",
                "get_full_documents",
                "load_all_available_meta",
            ],
            ProviderKind::Pubmed => &["top_k_results", "email", "api_key", "doc_content_chars_max"],
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Tavily => Some("TAVILY_API_KEY"),
            ProviderKind::Exa => Some("EXA_API_KEY"),
            ProviderKind::Perplexity => Some("PERPLEXITY_API_KEY"),
            ProviderKind::Arxiv => None,
            ProviderKind::Pubmed => Some("PUBMED_API_KEY"),
        }
    }

    /// Whether a batch cannot run without an API key.
    ///
    /// PubMed works anonymously at a lower rate limit.
    pub fn requires_api_key(&self) -> bool {
        matches!(
            self,
            ProviderKind::Tavily | ProviderKind::Exa | ProviderKind::Perplexity
        )
    }

    /// Scheduling the provider's rate limits call for
    pub fn default_pacing(&self) -> Pacing {
        match self {
            ProviderKind::Tavily => Pacing::Concurrent,
            // Exa allows 5 requests per second
            ProviderKind::Exa | ProviderKind::Perplexity => Pacing::fixed(0.25, 1.0),
            // arXiv asks for one request every 3 seconds
            ProviderKind::Arxiv => Pacing::fixed(3.0, 5.0),
            ProviderKind::Pubmed => Pacing::Adaptive(AdaptiveDelay::default()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" | "concurrent-web" => Ok(ProviderKind::Tavily),
            "exa" => Ok(ProviderKind::Exa),
            "perplexity" | "paced-web" => Ok(ProviderKind::Perplexity),
            "arxiv" | "academic" => Ok(ProviderKind::Arxiv),
            "pubmed" | "biomedical" => Ok(ProviderKind::Pubmed),
            other => Err(other.to_string()),
        }
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
            .map_err(|unknown| format!("unknown provider '{}'", unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("tavily".parse(), Ok(ProviderKind::Tavily));
        assert_eq!("ArXiv".parse(), Ok(ProviderKind::Arxiv));
        assert_eq!("paced-web".parse(), Ok(ProviderKind::Perplexity));
        assert_eq!("biomedical".parse(), Ok(ProviderKind::Pubmed));
        assert!("google".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_serde_accepts_aliases() {
        let kind: ProviderKind = serde_json::from_str("\"paced-web\"").unwrap();
        assert_eq!(kind, ProviderKind::Perplexity);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"perplexity\"");

        let err = serde_json::from_str::<ProviderKind>("\"google\"").unwrap_err();
        assert!(err.to_string().contains("unknown provider 'google'"));
    }

    #[test]
    fn test_only_tavily_runs_concurrently() {
        for kind in ProviderKind::all() {
            let sequential = kind.default_pacing().is_sequential();
            assert_eq!(sequential, *kind != ProviderKind::Tavily, "{}", kind);
        }
    }
}

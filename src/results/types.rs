//! Result type definitions

use serde::{Deserialize, Serialize};

/// A single normalized search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result
    pub title: String,
    /// The URL of the result, used as the deduplication key
    pub url: String,
    /// Snippet or summary of the content
    #[serde(default)]
    pub content: String,
    /// Relevance score, roughly in [0, 1]
    #[serde(default)]
    pub score: f64,
    /// Full text of the source when the provider supplied it
    #[serde(default)]
    pub raw_content: Option<String>,
}

impl SearchResult {
    /// Create a new result
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: String::new(),
            score: 0.0,
            raw_content: None,
        }
    }

    /// Set the snippet content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the relevance score
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Set the full text
    pub fn with_raw_content(mut self, raw_content: Option<String>) -> Self {
        self.raw_content = raw_content;
        self
    }
}

/// The response for one query of a batch.
///
/// A batch always yields exactly one of these per input query, in input
/// order. On failure `error` is set and `results` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The original query
    pub query: String,
    /// Follow-up questions suggested by the provider
    #[serde(default)]
    pub follow_up_questions: Option<Vec<String>>,
    /// Direct answer from the provider
    #[serde(default)]
    pub answer: Option<String>,
    /// Image references collected from top-level results
    #[serde(default)]
    pub images: Vec<String>,
    /// Ordered results
    #[serde(default)]
    pub results: Vec<SearchResult>,
    /// Failure message, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Create an empty successful response
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            follow_up_questions: None,
            answer: None,
            images: vec![],
            results: vec![],
            error: None,
        }
    }

    /// Create a successful response with results
    pub fn with_results(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            results,
            ..Self::new(query)
        }
    }

    /// Create a placeholder for a failed query
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(query)
        }
    }

    /// Add an image reference unless it is already present
    pub fn add_image(&mut self, image: impl Into<String>) {
        let image = image.into();
        if !image.is_empty() && !self.images.contains(&image) {
            self.images.push(image);
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }
}

/// Synthetic relevance score for providers that only return an ordering.
///
/// Starts at 1.0 and drops by `1 / (count + 1)` per rank, so the last of
/// `count` results still scores above zero.
pub fn rank_score(index: usize, count: usize) -> f64 {
    1.0 - index as f64 / (count + 1) as f64
}

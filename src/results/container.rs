//! Result container for merging and deduplicating results across batches

use super::types::*;
use std::collections::HashSet;

/// Container for merging results from one or more batches.
///
/// Deduplicates by exact URL with first-write-wins semantics: the first
/// result seen for a URL is kept and later ones are dropped, whatever their
/// content. Insertion order is preserved.
#[derive(Debug, Clone, Default)]
pub struct ResultContainer {
    /// Unique results in first-seen order
    results: Vec<SearchResult>,
    /// URLs already present in `results`
    seen_urls: HashSet<String>,
    /// Number of duplicates dropped
    duplicates: usize,
}

impl ResultContainer {
    /// Create a new empty result container
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from a sequence of query responses
    pub fn from_responses<'a, I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'a QueryResponse>,
    {
        let mut container = Self::new();
        for response in responses {
            container.add_response(response);
        }
        container
    }

    /// Add a result unless its URL was already seen.
    ///
    /// Returns whether the result was kept.
    pub fn add_result(&mut self, result: SearchResult) -> bool {
        if self.seen_urls.contains(&result.url) {
            self.duplicates += 1;
            return false;
        }
        self.seen_urls.insert(result.url.clone());
        self.results.push(result);
        true
    }

    /// Add every result of a response
    pub fn add_response(&mut self, response: &QueryResponse) {
        for result in &response.results {
            self.add_result(result.clone());
        }
    }

    /// Unique results in first-seen order
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    /// Number of unique results
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Number of dropped duplicates
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }
}

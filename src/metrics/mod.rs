//! Metrics collection module
//!
//! Tracks provider performance, error rates, and usage statistics.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Response times kept per provider
const RESPONSE_TIME_WINDOW: usize = 100;

/// Process-wide metrics collector
pub struct Metrics {
    /// Total batch count
    pub total_batches: AtomicU64,
    /// Queries per provider
    provider_queries: RwLock<HashMap<String, u64>>,
    /// Provider response times (rolling window in ms)
    provider_response_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Provider error counts
    provider_errors: RwLock<HashMap<String, u64>>,
    /// Provider success counts
    provider_successes: RwLock<HashMap<String, u64>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_batches: AtomicU64::new(0),
            provider_queries: RwLock::new(HashMap::new()),
            provider_response_times: RwLock::new(HashMap::new()),
            provider_errors: RwLock::new(HashMap::new()),
            provider_successes: RwLock::new(HashMap::new()),
        }
    }

    /// Increment total batch count
    pub fn inc_batch(&self) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one query sent to a provider
    pub fn record_query(&self, provider: &str) {
        let mut queries = self.provider_queries.write().unwrap();
        *queries.entry(provider.to_string()).or_insert(0) += 1;
    }

    /// Record provider response time
    pub fn record_response_time(&self, provider: &str, time_ms: u64) {
        let mut times = self.provider_response_times.write().unwrap();
        let entry = times.entry(provider.to_string()).or_default();

        if entry.len() >= RESPONSE_TIME_WINDOW {
            entry.remove(0);
        }
        entry.push(time_ms);
    }

    /// Record provider error
    pub fn record_error(&self, provider: &str) {
        let mut errors = self.provider_errors.write().unwrap();
        *errors.entry(provider.to_string()).or_insert(0) += 1;
    }

    /// Record provider success
    pub fn record_success(&self, provider: &str) {
        let mut successes = self.provider_successes.write().unwrap();
        *successes.entry(provider.to_string()).or_insert(0) += 1;
    }

    /// Get total batches
    pub fn get_total_batches(&self) -> u64 {
        self.total_batches.load(Ordering::Relaxed)
    }

    /// Get average response time for a provider
    pub fn get_avg_response_time(&self, provider: &str) -> Option<u64> {
        let times = self.provider_response_times.read().unwrap();
        times.get(provider).and_then(|t| {
            if t.is_empty() {
                None
            } else {
                Some(t.iter().sum::<u64>() / t.len() as u64)
            }
        })
    }

    /// Get reliability percentage for a provider
    pub fn get_reliability(&self, provider: &str) -> f64 {
        let errors = self.provider_errors.read().unwrap();
        let successes = self.provider_successes.read().unwrap();

        let error_count = *errors.get(provider).unwrap_or(&0);
        let success_count = *successes.get(provider).unwrap_or(&0);

        let total = error_count + success_count;
        if total == 0 {
            100.0
        } else {
            (success_count as f64 / total as f64) * 100.0
        }
    }

    /// Get all provider statistics
    pub fn get_provider_stats(&self) -> HashMap<String, ProviderStats> {
        let queries = self.provider_queries.read().unwrap();
        let errors = self.provider_errors.read().unwrap();

        queries
            .iter()
            .map(|(provider, count)| {
                (
                    provider.clone(),
                    ProviderStats {
                        queries: *count,
                        errors: *errors.get(provider).unwrap_or(&0),
                        avg_response_time: self.get_avg_response_time(provider),
                        reliability: self.get_reliability(provider),
                    },
                )
            })
            .collect()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    pub queries: u64,
    pub errors: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_batch();
        metrics.record_query("arxiv");
        metrics.record_response_time("arxiv", 100);
        metrics.record_success("arxiv");

        assert_eq!(metrics.get_total_batches(), 1);
        assert_eq!(metrics.get_avg_response_time("arxiv"), Some(100));
        assert_eq!(metrics.get_reliability("arxiv"), 100.0);
    }

    #[test]
    fn test_provider_stats() {
        let metrics = Metrics::new();
        for _ in 0..4 {
            metrics.record_query("pubmed");
        }
        metrics.record_success("pubmed");
        metrics.record_error("pubmed");

        let stats = metrics.get_provider_stats();
        let pubmed = &stats["pubmed"];
        assert_eq!(pubmed.queries, 4);
        assert_eq!(pubmed.errors, 1);
        assert_eq!(pubmed.reliability, 50.0);
        assert_eq!(pubmed.avg_response_time, None);
    }

    #[test]
    fn test_response_time_window() {
        let metrics = Metrics::new();
        for ms in 0..(RESPONSE_TIME_WINDOW as u64 + 10) {
            metrics.record_response_time("exa", ms);
        }
        // Oldest ten samples have been dropped: mean of 10..=109
        assert_eq!(metrics.get_avg_response_time("exa"), Some(59));
    }
}

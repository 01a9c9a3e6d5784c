//! Pacing policies for running a batch of queries against one provider

use std::time::Duration;

/// How a provider wants a batch scheduled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Every query in flight at once
    Concurrent,
    /// One query at a time with a fixed gap between them
    Fixed {
        /// Gap between consecutive queries (none before the first)
        interval: Duration,
        /// Extra pause after a rate-limited query
        rate_limit_pause: Duration,
    },
    /// One query at a time with a delay that adapts to outcomes
    Adaptive(AdaptiveDelay),
}

impl Pacing {
    /// Fixed pacing expressed in seconds
    pub fn fixed(interval_secs: f64, rate_limit_pause_secs: f64) -> Self {
        Pacing::Fixed {
            interval: Duration::from_secs_f64(interval_secs),
            rate_limit_pause: Duration::from_secs_f64(rate_limit_pause_secs),
        }
    }

    pub fn is_sequential(&self) -> bool {
        !matches!(self, Pacing::Concurrent)
    }

    pub fn describe(&self) -> String {
        match self {
            Pacing::Concurrent => "concurrent".to_string(),
            Pacing::Fixed { interval, .. } => {
                format!("sequential, {:.2}s between queries", interval.as_secs_f64())
            }
            Pacing::Adaptive(delay) => format!(
                "sequential, adaptive {:.2}s-{:.2}s between queries",
                delay.floor, delay.ceiling
            ),
        }
    }
}

/// Multiplier applied after a query that returned results
const DECAY: f64 = 0.9;
/// Multiplier applied after a failed query
const GROWTH: f64 = 1.5;

/// Inter-query delay that shrinks after productive queries and grows after
/// failures, bounded by a floor and a ceiling.
///
/// Owned by the loop running a single batch; every batch starts from the
/// initial value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveDelay {
    current: f64,
    floor: f64,
    ceiling: f64,
}

impl AdaptiveDelay {
    /// Delay starting at `initial` seconds within `[floor, ceiling]`
    pub fn new(initial: f64, floor: f64, ceiling: f64) -> Self {
        Self {
            current: initial.clamp(floor, ceiling),
            floor,
            ceiling,
        }
    }

    /// Current delay in seconds
    pub fn seconds(&self) -> f64 {
        self.current
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.current)
    }

    /// A query returned at least one result
    pub fn on_success(&mut self) {
        self.current = (self.current * DECAY).max(self.floor);
    }

    /// A query failed
    pub fn on_failure(&mut self) {
        self.current = (self.current * GROWTH).min(self.ceiling);
    }
}

impl Default for AdaptiveDelay {
    fn default() -> Self {
        Self::new(1.0, 0.5, 5.0)
    }
}

/// Whether an error message reports provider rate limiting
pub fn is_rate_limit_error(message: &str) -> bool {
    message.contains("429") || message.contains("Too Many Requests")
}

//! Result handling module
//!
//! Defines the canonical result schema every provider produces, plus
//! cross-batch deduplication and rendering of the final source report.

mod container;
mod format;
mod types;

pub use container::ResultContainer;
pub use format::{
    deduplicate_and_format_sources, format_sources, CHARS_PER_TOKEN, TRUNCATION_MARKER,
};
pub use types::*;
